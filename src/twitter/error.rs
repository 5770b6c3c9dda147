//! Error types for the X (Twitter) publication client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Non-success HTTP status with the API's `detail`/`title` message.
    #[error("X API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API accepted the request but returned no post id.
    #[error("response did not contain a post id")]
    MissingId,

    #[error("publication timed out after {0}s")]
    Timeout(u64),
}
