//! HTTP client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::GenerationError;
use super::types::{GenerateContentRequest, GenerateContentResponse, GenerationRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Anything that can turn a prompt into one piece of text.
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Gemini REST client bound to one model.
pub struct GeminiClient {
    /// Sent as `x-goog-api-key`.
    api_key: String,
    /// Model id, e.g. `gemini-2.0-flash`.
    model: String,
    client: Client,
    /// API root; a trailing slash is tolerated.
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, GenerationError> {
        Self::with_base_url(api_key, model, API_BASE.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            api_key,
            model,
            client,
            base_url,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    pub async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(GenerationError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or(text);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<GenerateContentResponse>().await?;
        Ok(body)
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, GenerationError> {
        debug!(model = %self.model, grounding = req.grounding, "Requesting generation");
        let body = GenerateContentRequest::from(req);
        let response = self.generate_content(&body).await?;

        if let Some(reason) = response.block_reason() {
            return Err(GenerationError::Blocked(reason));
        }
        response.text().ok_or(GenerationError::Empty)
    }
}
