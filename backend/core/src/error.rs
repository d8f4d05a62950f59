use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes surfaced to clients at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    DataError,
    GenerationFailed,
    RateLimit,
    Timeout,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::DataError => "DATA_ERROR",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for the ChartForge pipeline.
#[derive(Debug, Clone, Error)]
pub enum ChartError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("chart generation failed: {0}")]
    GenerationFailed(String),

    #[error("rate limit reached for {class}; retry after {retry_after_ms}ms")]
    RateLimited { class: String, retry_after_ms: u64 },

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: String, after_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChartError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ChartError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ChartError::Data(_) => ErrorCode::DataError,
            ChartError::GenerationFailed(_) => ErrorCode::GenerationFailed,
            ChartError::RateLimited { .. } => ErrorCode::RateLimit,
            ChartError::Timeout { .. } => ErrorCode::Timeout,
            ChartError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Structured context carried in the wire `details` object.
    pub fn details(&self) -> serde_json::Value {
        match self {
            ChartError::RateLimited { class, retry_after_ms } => serde_json::json!({
                "class": class,
                "retry_after_ms": retry_after_ms,
            }),
            ChartError::Timeout { stage, after_ms } => serde_json::json!({
                "stage": stage,
                "after_ms": after_ms,
            }),
            _ => serde_json::json!({}),
        }
    }
}

/// Wire shape of an error: `{code, message, details}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::json!({}),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

impl From<&ChartError> for ErrorDetail {
    fn from(err: &ChartError) -> Self {
        ErrorDetail {
            code: err.code(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}
