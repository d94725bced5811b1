//! Error types for the redate server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::DocumentError;
use crate::session::SessionError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Processing timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Status code, error type and client-facing message
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg.clone())
            }
            AppError::Timeout(secs) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("Processing did not finish within {} seconds", secs),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Document(e) => match e {
                DocumentError::NotFound(path) => {
                    (StatusCode::NOT_FOUND, "not_found", format!("File not found: {}", path))
                }
                DocumentError::PageNotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", e.to_string())
                }
                DocumentError::PasswordRequired => (
                    StatusCode::UNAUTHORIZED,
                    "password_required",
                    "PDF is encrypted. Please provide a password.".to_string(),
                ),
                DocumentError::InvalidPassword => (
                    StatusCode::UNAUTHORIZED,
                    "invalid_password",
                    "Invalid password".to_string(),
                ),
                DocumentError::ParseError(_) | DocumentError::InvalidContent(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_pdf",
                    "The PDF could not be processed".to_string(),
                ),
                _ => {
                    tracing::error!("Document error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "document_error",
                        "Failed to process document".to_string(),
                    )
                }
            },
            AppError::Session(e) => {
                let error_type = match e {
                    SessionError::NotFound(_) => "session_not_found",
                    SessionError::Expired(_) => "session_expired",
                    SessionError::Io(err) => {
                        tracing::error!("Session storage error: {}", err);
                        "session_error"
                    }
                };
                (e.status_code(), error_type, e.to_string())
            }
            AppError::Json(e) => (
                StatusCode::BAD_REQUEST,
                "invalid_json",
                format!("Invalid JSON: {}", e),
            ),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
