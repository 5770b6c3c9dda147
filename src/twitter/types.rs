use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostResponse {
    #[serde(default)]
    pub data: Option<PostData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub data: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A post that now exists on the network, with its permanent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_response_deserialize_from_api_format() {
        let json = r#"{"data": {"id": "1445880548472328192", "text": "hello", "edit_history_tweet_ids": ["1445880548472328192"]}}"#;
        let resp: CreatePostResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.unwrap().id, "1445880548472328192");
    }

    #[test]
    fn create_response_without_data() {
        let resp: CreatePostResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.data.is_none());
    }
}
