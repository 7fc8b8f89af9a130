//! GatePass Approval — orchestration of the permit workflow.
//!
//! This crate wires the pure state machine from `gatepass-core` to the
//! repository contracts: every mutation runs as an atomic
//! read-decide-write with optimistic retry, transitions are audited,
//! and side effects (credential issuance, retirement) execute only
//! after the transition is durably committed.
//!
//! Generic over repository implementations so that the workflow layer
//! has no dependency on the database crate.

pub mod checkpoint;
pub mod config;
pub mod issuer;
pub mod render;
pub mod service;

pub use checkpoint::{CheckpointValidator, DenyReason, ScanOutcome, SubjectSummary};
pub use config::ApprovalConfig;
pub use issuer::CredentialIssuer;
pub use render::{ArtifactRenderer, RenderError, RenderedArtifacts};
pub use service::{ApprovalOutcome, ApprovalService};
