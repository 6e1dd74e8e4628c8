//! HTTP mapping of the shared error taxonomy.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;
use vigil_auth::AuthError;
use vigil_core::error::VigilError;

/// Error returned by every procedure; renders as `{ "error": msg }`.
#[derive(Debug)]
pub struct ApiError(pub VigilError);

impl ApiError {
    pub fn unauthorized(reason: &str) -> Self {
        Self(VigilError::AuthenticationFailed {
            reason: reason.into(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            VigilError::Validation { .. } => StatusCode::BAD_REQUEST,
            VigilError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            VigilError::Forbidden { .. }
            | VigilError::DeviceBlocked { .. }
            | VigilError::DeviceLimitExceeded { .. } => StatusCode::FORBIDDEN,
            VigilError::NotFound { .. } => StatusCode::NOT_FOUND,
            VigilError::AlreadyExists { .. } => StatusCode::CONFLICT,
            VigilError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            VigilError::Database(_) | VigilError::Crypto(_) | VigilError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!(error = %self.0, "Request failed");
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
