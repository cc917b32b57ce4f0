//! Application-level error surface.
//!
//! HTTP handlers return [`AppError`]; every failure is rendered as the
//! `{success, message, error_code}` envelope so clients can branch on the
//! machine-readable code instead of parsing messages.

use crate::config::ConfigError;
use crate::payments::error::PaymentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error_code: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Payment(err) => StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Payment(err) => err.error_code(),
            AppError::Config(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn user_message(&self) -> String {
        match self {
            AppError::Payment(err) => err.user_message(),
            // Internal details never reach the client.
            AppError::Config(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorBody {
            success: false,
            message: self.user_message(),
            error_code: self.error_code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_errors_keep_their_status() {
        let err = AppError::from(PaymentError::SignatureInvalid {
            message: "bad".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "SIGNATURE_INVALID");
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal("pool exhausted at 10.0.0.5".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "An internal error occurred");
    }
}
