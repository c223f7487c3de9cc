//! Error types for hubsync-detector.

use thiserror::Error;

/// Failures talking to the fork source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure or a 5xx / 429 response. The unit is skipped.
    #[error("transient failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// Rate limit exhausted. `reset` is the epoch second the quota renews.
    #[error("rate limited (reset at {reset:?})")]
    RateLimited { reset: Option<i64> },

    #[error("not found: {url}")]
    NotFound { url: String },

    /// Any other non-success status (401, 403 without rate limit, ...).
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }
}
