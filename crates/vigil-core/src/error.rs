//! Error types for the Vigil system.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VigilError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Not user-facing: the login gate turns this into a pending-approval
    /// attempt instead of failing the request.
    #[error("Device limit of {ceiling} reached for user {user_id}")]
    DeviceLimitExceeded { user_id: Uuid, ceiling: u32 },

    #[error("Device blocked: {reason}")]
    DeviceBlocked { reason: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type VigilResult<T> = Result<T, VigilError>;
