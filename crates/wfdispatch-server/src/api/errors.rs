//! Error handling for the wfdispatch API
//!
//! Every error response uses the same envelope:
//! `{"error": ..., "errorDetails": {"errorCode": ..., "errorMessage": ...}}`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use wfdispatch_core::DispatchError;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Unauthorized (401)
    Unauthorized(String),
    /// Wrapped dispatch error
    Dispatch(DispatchError),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Dispatch(err) => write!(f, "{}", err),
        }
    }
}

impl ApiError {
    /// HTTP status and stable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "ERR_UNAUTHORIZED"),
            ApiError::Dispatch(DispatchError::NotFound(_)) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND"),
            // No usable namespace for this identity
            ApiError::Dispatch(DispatchError::Configuration(_)) => (StatusCode::FORBIDDEN, "ERR_CONFIGURATION"),
            ApiError::Dispatch(DispatchError::BackendUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, "ERR_BACKEND_UNAVAILABLE")
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Dispatch(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = self.status_and_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::warn!(%status, %message, "Request failed");
        } else {
            tracing::debug!(%status, %message, "Request rejected");
        }

        let body = Json(json!({
            "error": message,
            "errorDetails": {
                "errorCode": error_code,
                "errorMessage": message,
            }
        }));

        (status, body).into_response()
    }
}
