pub mod client;
pub mod error;
pub mod oauth;
pub mod types;

pub use client::{Publisher, TwitterClient};
pub use error::PublishError;
pub use oauth::OAuthCredentials;
pub use types::PublishedPost;
