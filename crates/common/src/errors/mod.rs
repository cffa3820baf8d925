//! Error types for PaperScout services
//!
//! Provides a single error taxonomy for the discovery pipeline with:
//! - Distinct error types for each failure mode of a scan
//! - HTTP status code mapping
//! - Structured failure responses (`{success: false, error, code}`)
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidDateRange,

    // Authentication errors (2xxx)
    Unauthorized,

    // Conflict errors (5xxx)
    ScanInProgress,

    // Rate limiting (6xxx)
    RateLimited,

    // Store errors (7xxx)
    StoreUnavailable,

    // External source errors (8xxx)
    SourceUnavailable,
    ParseDegraded,
    SubprocessFailed,
    SubprocessTimeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidDateRange => 1002,

            ErrorCode::Unauthorized => 2001,

            ErrorCode::ScanInProgress => 5001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::StoreUnavailable => 7001,

            ErrorCode::SourceUnavailable => 8001,
            ErrorCode::ParseDegraded => 8002,
            ErrorCode::SubprocessFailed => 8003,
            ErrorCode::SubprocessTimeout => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid date range: {message}")]
    InvalidDateRange { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Conflict errors
    #[error("A {kind} scan is already in progress")]
    ScanInProgress { kind: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Store errors
    #[error("Discovery store unavailable: {message}")]
    StoreUnavailable { message: String },

    // External source errors
    #[error("{provider} unavailable: {message}")]
    SourceUnavailable {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} source is disabled")]
    SourceDisabled { provider: String },

    #[error("External task '{program}' failed: {message}")]
    SubprocessFailed { program: String, message: String },

    #[error("External task '{program}' timed out after {timeout_secs}s")]
    SubprocessTimeout { program: String, timeout_secs: u64 },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::ScanInProgress { .. } => ErrorCode::ScanInProgress,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
            AppError::SourceDisabled { .. } => ErrorCode::ServiceUnavailable,
            AppError::SubprocessFailed { .. } => ErrorCode::SubprocessFailed,
            AppError::SubprocessTimeout { .. } => ErrorCode::SubprocessTimeout,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::InvalidDateRange { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 409 Conflict
            AppError::ScanInProgress { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::SourceUnavailable { .. } | AppError::SubprocessFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } | AppError::SourceDisabled { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 504 Gateway Timeout
            AppError::SubprocessTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Shorthand for store failures
    pub fn store(message: impl Into<String>) -> Self {
        AppError::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Shorthand for validation failures on a named field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

/// Structured failure response returned to trigger callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                error_code = code.as_code(),
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                error_code = code.as_code(),
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code,
            field,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
