//! Error types for the GatePass system.

use thiserror::Error;

use crate::state::GuardViolation;

#[derive(Debug, Error)]
pub enum GatepassError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A state-machine guard rejected the transition. Never partially
    /// applied.
    #[error("Transition rejected: {0}")]
    Guard(#[from] GuardViolation),

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Lost the race on an atomic read-modify-write. Retryable: re-read
    /// the record and re-apply the decision.
    #[error("Concurrent modification of {entity} with id {id}")]
    Conflict { entity: String, id: String },

    /// The artifact renderer failed. Non-fatal to an already-committed
    /// approval; recoverable via regeneration.
    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatepassError {
    /// Whether the caller may retry the operation after re-reading
    /// current state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatepassError::Conflict { .. })
    }
}

pub type GatepassResult<T> = Result<T, GatepassError>;
