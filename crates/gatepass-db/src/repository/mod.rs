//! SurrealDB repository implementations.

mod access_request;
mod audit;
mod credential;

pub use access_request::SurrealAccessRequestRepository;
pub use audit::SurrealAuditLogRepository;
pub use credential::SurrealCredentialRepository;
