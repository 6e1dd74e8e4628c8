//! Database-specific error types and conversions.

use vigil_core::error::VigilError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A stored row could not be mapped back onto a domain type.
    #[error("Corrupt row in {table}: {message}")]
    Decode { table: &'static str, message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl DbError {
    pub(crate) fn decode(table: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            table,
            message: message.to_string(),
        }
    }
}

impl From<DbError> for VigilError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => VigilError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => VigilError::AlreadyExists { entity },
            other => VigilError::Database(other.to_string()),
        }
    }
}
