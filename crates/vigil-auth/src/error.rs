//! Authentication error types.

use thiserror::Error;
use vigil_core::error::VigilError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account is suspended")]
    AccountSuspended,

    #[error("biometric login is not enabled for this account")]
    BiometricNotEnabled,

    #[error("password does not meet policy: {0}")]
    WeakPassword(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("geolocation lookup failed: {0}")]
    Geolocation(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for VigilError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::AccountSuspended
            | AuthError::BiometricNotEnabled
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::SessionRevoked => VigilError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::WeakPassword(_) => VigilError::Validation {
                message: err.to_string(),
            },
            AuthError::Geolocation(_) | AuthError::Timeout(_) => {
                VigilError::ExternalService(err.to_string())
            }
            AuthError::Crypto(msg) => VigilError::Crypto(msg),
        }
    }
}
