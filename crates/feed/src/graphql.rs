use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use interface::FeedError;

pub const DEFAULT_ENDPOINT: &str = "https://api.sorare.com/graphql";

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

/// 마켓플레이스 GraphQL API 클라이언트
/// 토큰 발급(로그인)은 이 크레이트의 범위가 아니며, 발급된 토큰을 주입받는다.
#[derive(Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    audience: Option<String>,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: None,
            audience: None,
        }
    }

    pub fn with_credentials(
        endpoint: impl Into<String>,
        token: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            token,
            audience,
            ..Self::new(endpoint)
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, FeedError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        // API는 JWT audience 헤더 이름을 정확히 이렇게 요구한다
        if let Some(aud) = &self.audience {
            request = request.header("JWT-AUD", aud.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(FeedError::Api(format!(
                "GraphQL HTTP error: status {}, response: {}",
                status,
                response_text.chars().take(200).collect::<String>()
            )));
        }

        decode_response(&response_text)
    }
}

fn decode_response<T: DeserializeOwned>(response_text: &str) -> Result<T, FeedError> {
    let parsed: GraphqlResponse<T> = serde_json::from_str(response_text).map_err(|e| {
        FeedError::Decode(format!(
            "Failed to parse GraphQL response: {}, response: {}",
            e,
            response_text.chars().take(200).collect::<String>()
        ))
    })?;

    if !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
        return Err(FeedError::Api(messages.join("; ")));
    }

    parsed
        .data
        .ok_or_else(|| FeedError::Decode("GraphQL response has no data".to_string()))
}
