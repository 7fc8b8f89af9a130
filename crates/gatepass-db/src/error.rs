//! Database-specific error types and conversions.

use gatepass_core::error::GatepassError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Optimistic version check failed on read-modify-write.
    #[error("Version conflict on {entity} with id {id}")]
    Conflict { entity: String, id: String },
}

impl From<DbError> for GatepassError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GatepassError::NotFound { entity, id },
            DbError::Conflict { entity, id } => GatepassError::Conflict { entity, id },
            other => GatepassError::Database(other.to_string()),
        }
    }
}
