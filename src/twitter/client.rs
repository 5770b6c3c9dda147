//! X API v2 client: post creation and the account lookup used to build
//! permanent links.

use std::time::Duration;

use reqwest::{Client, Response};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::error::PublishError;
use super::oauth::OAuthCredentials;
use super::types::{CreatePostRequest, CreatePostResponse, PublishedPost, UserResponse};

const API_BASE: &str = "https://api.twitter.com/2";
const WEB_BASE: &str = "https://twitter.com";

/// Anything that can publish one text and hand back a permanent reference.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    async fn publish(&self, text: &str) -> Result<PublishedPost, PublishError>;
}

/// X API v2 client posting on behalf of the account behind the access token.
pub struct TwitterClient {
    client: Client,
    /// Signs every request as the posting account.
    credentials: OAuthCredentials,
    /// API root, e.g. `https://api.twitter.com/2`, without trailing slash.
    api_base: String,
    // Looked up once; the account never changes for a given token.
    username: OnceCell<String>,
}

impl TwitterClient {
    pub fn new(credentials: OAuthCredentials) -> Result<Self, PublishError> {
        Self::with_base_url(credentials, API_BASE.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        credentials: OAuthCredentials,
        api_base: String,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            username: OnceCell::new(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    async fn check_response(response: Response) -> Result<Response, PublishError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v["detail"]
                    .as_str()
                    .or(v["title"].as_str())
                    .or(v["errors"][0]["message"].as_str())
                    .map(String::from)
            })
            .unwrap_or(text);

        Err(PublishError::Api { status, message })
    }

    /// Post `text` and return the new post's id.
    pub async fn create_post(&self, text: &str) -> Result<String, PublishError> {
        let url = self.url("/tweets");
        let auth = self.credentials.authorization_header("POST", &url, &[]);

        let response = self
            .client
            .post(&url)
            .header("authorization", auth)
            .json(&CreatePostRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let body: CreatePostResponse = Self::check_response(response).await?.json().await?;
        body.data
            .map(|d| d.id)
            .filter(|id| !id.is_empty())
            .ok_or(PublishError::MissingId)
    }

    /// Username of the authenticated account.
    pub async fn username(&self) -> Result<&str, PublishError> {
        let name = self.username.get_or_try_init(|| self.fetch_username()).await?;
        Ok(name.as_str())
    }

    async fn fetch_username(&self) -> Result<String, PublishError> {
        let url = self.url("/users/me");
        let auth = self.credentials.authorization_header("GET", &url, &[]);
        let response = self
            .client
            .get(&url)
            .header("authorization", auth)
            .send()
            .await?;
        let body: UserResponse = Self::check_response(response).await?.json().await?;
        debug!(user_id = ?body.data.as_ref().map(|u| &u.id), "Resolved posting account");
        body.data.map(|u| u.username).ok_or(PublishError::Api {
            status: 200,
            message: "users/me returned no data".into(),
        })
    }
}

impl Publisher for TwitterClient {
    async fn publish(&self, text: &str) -> Result<PublishedPost, PublishError> {
        let id = self.create_post(text).await?;
        let url = match self.username().await {
            Ok(username) => format!("{WEB_BASE}/{username}/status/{id}"),
            Err(e) => {
                // The post exists already; only the pretty link is lost.
                warn!(error = %e, post_id = %id, "Could not resolve username for post link");
                format!("{WEB_BASE}/i/web/status/{id}")
            }
        };
        Ok(PublishedPost { id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            access_token: "at".into(),
            access_token_secret: "ats".into(),
        }
    }

    async fn mount_me(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "42", "name": "Bot", "username": "example_bot"}
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn publish_returns_status_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .and(header_exists("authorization"))
            .and(body_json(serde_json::json!({"text": "hello world"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "1001", "text": "hello world"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_me(&server, 1).await;

        let client = TwitterClient::with_base_url(credentials(), server.uri()).unwrap();
        let post = client.publish("hello world").await.unwrap();
        assert_eq!(post.id, "1001");
        assert_eq!(post.url, "https://twitter.com/example_bot/status/1001");
    }

    #[tokio::test]
    async fn username_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "7", "text": "x"}
            })))
            .mount(&server)
            .await;
        mount_me(&server, 1).await;

        let client = TwitterClient::with_base_url(credentials(), server.uri()).unwrap();
        client.publish("one").await.unwrap();
        client.publish("two").await.unwrap();
    }

    #[tokio::test]
    async fn publish_maps_api_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "title": "Forbidden",
                "detail": "You are not allowed to create a Tweet with duplicate content.",
                "status": 403
            })))
            .mount(&server)
            .await;

        let client = TwitterClient::with_base_url(credentials(), server.uri()).unwrap();
        let err = client.publish("dup").await.unwrap_err();
        match err {
            PublishError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("duplicate content"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = TwitterClient::with_base_url(credentials(), server.uri()).unwrap();
        let err = client.publish("hi").await.unwrap_err();
        assert!(matches!(err, PublishError::MissingId));
    }

    #[tokio::test]
    async fn link_falls_back_when_username_lookup_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": {"id": "55", "text": "hi"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = TwitterClient::with_base_url(credentials(), server.uri()).unwrap();
        let post = client.publish("hi").await.unwrap();
        assert_eq!(post.url, "https://twitter.com/i/web/status/55");
    }
}
