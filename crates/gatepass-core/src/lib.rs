//! GatePass Core — domain models, the approval state machine, and
//! repository trait contracts for the vehicle-access permit system.
//!
//! This crate is pure domain logic: no I/O, no storage, no transport.
//! Storage implementations live in `gatepass-db`; orchestration lives
//! in `gatepass-approval`.

pub mod error;
pub mod models;
pub mod repository;
pub mod state;

pub use error::{GatepassError, GatepassResult};
