use crate::error::UrlManagementError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

/// JSON error response: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// A request body that does not carry a usable `longUrl`.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_url",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<UrlManagementError> for ApiError {
    fn from(err: UrlManagementError) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            UrlManagementError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
            UrlManagementError::UrlNotFound(_) => (StatusCode::NOT_FOUND, "url_not_found"),
            UrlManagementError::ShortCodeCollision(_) => {
                error!(error = %message, "short code space exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, "short_code_collision")
            }
            UrlManagementError::Persistence(_) => {
                error!(error = %message, "request failed on persistence");
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failure")
            }
        };
        Self {
            status,
            code,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorInfo {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
