//! Persona Hub error types
//!
//! Library operations return [`Error`]; at the HTTP boundary every variant
//! maps to a status code and the JSON envelope
//! `{"error": {"code": ..., "message": ..., "field": ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Persona Hub error type
#[derive(Error, Debug)]
pub enum Error {
    /// Id does not resolve under the caller's visibility rules
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks ownership or admin rights
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No principal could be resolved for the request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request payload
    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Wire representation of this error
    pub fn to_api_error(&self) -> ApiError {
        let (message, field) = match self {
            Self::Validation { field, message } => (message.clone(), Some(field.clone())),
            Self::NotFound(msg) | Self::Forbidden(msg) | Self::Unauthorized(msg) => {
                (msg.clone(), None)
            }
            // Internal details stay in the logs
            _ => ("Internal server error".to_string(), None),
        };
        ApiError {
            error: ApiErrorDetail {
                code: self.code().to_string(),
                message,
                field,
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(self.to_api_error())).into_response()
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Result type alias for Persona Hub operations
pub type Result<T> = std::result::Result<T, Error>;
