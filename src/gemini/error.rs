//! Error types for the Gemini generation client.

use thiserror::Error;

/// Errors raised while asking the generation service for a post.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP 429 from the API.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success HTTP status, with the message from the body.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (DNS, connection refused, client timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The prompt or the candidate was blocked by safety filtering.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// The service answered but produced no usable text.
    #[error("response contained no text")]
    Empty,

    #[error("generation timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = GenerationError::Api {
            status: 403,
            message: "API key not valid".into(),
        };
        assert_eq!(err.to_string(), "API error (status 403): API key not valid");
    }

    #[test]
    fn blocked_display() {
        let err = GenerationError::Blocked("SAFETY".into());
        assert_eq!(err.to_string(), "response blocked: SAFETY");
    }
}
