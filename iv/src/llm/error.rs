//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Wait assumed when a 429 carries no usable `retry-after`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Longest `retry-after` honoured before the attempt is given up
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

impl LlmError {
    /// Classify a non-success HTTP response
    pub fn from_status(status: u16, retry_after: Option<&str>, message: String) -> Self {
        if status == 429 {
            let secs = retry_after
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return LlmError::RateLimited {
                retry_after: Duration::from_secs(secs),
            };
        }
        LlmError::ApiError { status, message }
    }

    /// Check if this error is retryable at the transport level
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { retry_after } => *retry_after <= MAX_RETRY_AFTER,
            LlmError::ApiError { status, .. } => *status == 408 || *status >= 500,
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Config(_) => false,
            LlmError::Json(_) => false,
        }
    }

    /// Delay before retry number `attempt` (1-based) after this error
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        match self {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1))),
        }
    }
}
