// src/api/error.rs
// HTTP error responses shared by every route

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

/// Standard API error response format
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
    pub error_code: Option<String>,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    fn with_code(status_code: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code,
            error_code: Some(code.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response_json = json!({
            "error": true,
            "message": self.message,
            "status": self.status_code.as_u16()
        });

        if let Some(error_code) = self.error_code {
            response_json["error_code"] = json!(error_code);
        }

        (self.status_code, Json(response_json)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Logs the underlying cause and returns a generic 500; storage details stay
/// out of the response body.
pub fn db_error(operation: &str, error: impl fmt::Debug) -> ApiError {
    let message = format!("Database error during {operation}");
    error!("{}: {:?}", message, error);
    ApiError::internal(message)
}

pub fn invalid_param_error(param_name: &str, reason: &str) -> ApiError {
    ApiError::bad_request(format!("Invalid parameter '{param_name}': {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_carries_code() {
        let error = ApiError::forbidden("missing permission audit:read");
        assert_eq!(error.status_code, StatusCode::FORBIDDEN);
        assert_eq!(error.error_code.as_deref(), Some("FORBIDDEN"));
    }

    #[test]
    fn db_error_hides_cause() {
        let error = db_error("audit listing", sqlx::Error::PoolTimedOut);
        assert_eq!(error.status_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, "Database error during audit listing");
    }

    #[test]
    fn invalid_param_names_parameter() {
        let error = invalid_param_error("port", "must be 1-65535");
        assert_eq!(error.status_code, StatusCode::BAD_REQUEST);
        assert!(error.message.contains("'port'"));
    }
}
