// Bitbucket Cloud pipelines client - just enough API to ask "is it green?"
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BITBUCKET_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// How many recent pipelines to look at per poll
pub const DEFAULT_PAGE_LEN: u32 = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum BitbucketError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Repository not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BitbucketError>;

pub struct BitbucketClient {
    client: reqwest::Client,
    username: Option<String>,
    app_password: Option<String>,
    base_url: String,
}

impl BitbucketClient {
    pub fn new(username: Option<String>, app_password: Option<String>) -> Result<Self> {
        Self::with_base_url(username, app_password, BITBUCKET_API_BASE.to_string())
    }

    /// For Bitbucket Server/Data Center or testing with custom API URL
    pub fn with_base_url(
        username: Option<String>,
        app_password: Option<String>,
        base_url: String,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("buildlight/0.1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            username,
            app_password,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create Basic Auth header value
    fn basic_auth_header(&self) -> Option<String> {
        match (&self.username, &self.app_password) {
            (Some(username), Some(password)) => {
                let credentials = format!("{}:{}", username, password);
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    credentials.as_bytes(),
                );
                Some(format!("Basic {}", encoded))
            }
            _ => None,
        }
    }

    fn pipelines_url(&self, full_name: &str) -> String {
        format!("{}/repositories/{}/pipelines/", self.base_url, full_name)
    }

    /// Fetch the most recent pipelines of a repository, newest first
    ///
    /// `full_name` is the `owner/slug` pair, e.g. `acme/billing-service`.
    pub async fn get_pipelines(&self, full_name: &str, page_len: u32) -> Result<PipelinesPage> {
        let url = self.pipelines_url(full_name);
        debug!("polling {}", url);

        let mut request = self.client.get(&url).query(&[
            ("sort", "-created_on".to_string()),
            ("pagelen", page_len.to_string()),
        ]);

        if let Some(auth) = self.basic_auth_header() {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("{} answered {}", full_name, status);

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BitbucketError::NotFound(full_name.to_string()));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BitbucketError::AuthRequired);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BitbucketError::RateLimitExceeded);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BitbucketError::RequestFailed(format!(
                "Status {}: {}",
                status, body
            )));
        }

        // Read the raw body first so a decode failure can show what came back
        let body = response.text().await?;
        let page: PipelinesPage = serde_json::from_str(&body)?;
        if page.values.is_empty() {
            debug!("no pipelines for {}: {}", full_name, body);
        }
        Ok(page)
    }
}

/// One page of `GET /repositories/{owner}/{slug}/pipelines/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelinesPage {
    #[serde(default)]
    pub values: Vec<Pipeline>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub build_number: Option<u64>,
    #[serde(default)]
    pub created_on: Option<String>,
    pub state: PipelineState,
}

/// Pipeline state
///
/// `name` is `PENDING`, `IN_PROGRESS` or `COMPLETED`. Only completed
/// pipelines carry a `result` (`SUCCESSFUL`, `FAILED`, `STOPPED`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub result: Option<PipelineResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn test_client_creation() {
        let client = BitbucketClient::new(None, None).unwrap();
        assert!(client.username.is_none());
        assert!(client.app_password.is_none());
        assert_eq!(client.base_url, BITBUCKET_API_BASE);
    }

    #[test]
    fn test_client_with_credentials() {
        let username = "test_user".to_string();
        let password = "test_password".to_string();
        let client = BitbucketClient::new(Some(username.clone()), Some(password.clone())).unwrap();
        assert_eq!(client.username, Some(username));
        assert_eq!(client.app_password, Some(password));
    }

    #[test]
    fn test_basic_auth_header() {
        let client = BitbucketClient::new(
            Some("testuser".to_string()),
            Some("testpass".to_string()),
        )
        .unwrap();
        // base64("testuser:testpass")
        assert_eq!(
            client.basic_auth_header().as_deref(),
            Some("Basic dGVzdHVzZXI6dGVzdHBhc3M=")
        );
    }

    #[test]
    fn test_no_auth_header_without_password() {
        let client = BitbucketClient::new(Some("testuser".to_string()), None).unwrap();
        assert!(client.basic_auth_header().is_none());
    }

    #[test]
    fn test_pipelines_url_trims_trailing_slash() {
        let client =
            BitbucketClient::with_base_url(None, None, "http://localhost:8080/2.0/".to_string())
                .unwrap();
        assert_eq!(
            client.pipelines_url("acme/billing"),
            "http://localhost:8080/2.0/repositories/acme/billing/pipelines/"
        );
    }

    #[test]
    fn test_parse_pipelines_page() {
        let body = r#"{
            "page": 1,
            "pagelen": 10,
            "size": 2,
            "values": [
                {"uuid": "{a}", "build_number": 42, "state": {"name": "IN_PROGRESS", "type": "pipeline_state_in_progress"}},
                {"uuid": "{b}", "build_number": 41, "state": {"name": "COMPLETED", "result": {"name": "SUCCESSFUL"}}}
            ]
        }"#;

        let page: PipelinesPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.values.len(), 2);
        assert_eq!(page.values[0].state.name, "IN_PROGRESS");
        assert!(page.values[0].state.result.is_none());
        assert_eq!(page.values[1].build_number, Some(41));
        assert_eq!(
            page.values[1].state.result.as_ref().map(|r| r.name.as_str()),
            Some("SUCCESSFUL")
        );
    }

    #[test]
    fn test_parse_page_without_values() {
        let page: PipelinesPage = serde_json::from_str(r#"{"page": 1}"#).unwrap();
        assert!(page.values.is_empty());
    }

    async fn client_for(status_line: &str, body: &str) -> BitbucketClient {
        let url = serve_once(status_line, body).await;
        BitbucketClient::with_base_url(Some("me".into()), Some("secret".into()), url).unwrap()
    }

    #[tokio::test]
    async fn test_http_errors_map_to_variants() {
        let client = client_for("401 Unauthorized", "").await;
        assert!(matches!(
            client.get_pipelines("acme/api", DEFAULT_PAGE_LEN).await,
            Err(BitbucketError::AuthRequired)
        ));

        let client = client_for("404 Not Found", "").await;
        match client.get_pipelines("acme/gone", DEFAULT_PAGE_LEN).await {
            Err(BitbucketError::NotFound(repo)) => assert_eq!(repo, "acme/gone"),
            other => panic!("expected NotFound, got {:?}", other),
        }

        let client = client_for("429 Too Many Requests", "").await;
        assert!(matches!(
            client.get_pipelines("acme/api", DEFAULT_PAGE_LEN).await,
            Err(BitbucketError::RateLimitExceeded)
        ));

        let client = client_for("500 Internal Server Error", "upstream down").await;
        match client.get_pipelines("acme/api", DEFAULT_PAGE_LEN).await {
            Err(BitbucketError::RequestFailed(msg)) => {
                assert!(msg.contains("500"), "{}", msg);
                assert!(msg.contains("upstream down"), "{}", msg);
            }
            other => panic!("expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let client = client_for("200 OK", "<html>maintenance</html>").await;
        assert!(matches!(
            client.get_pipelines("acme/api", DEFAULT_PAGE_LEN).await,
            Err(BitbucketError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_get_pipelines_success() {
        let client = client_for(
            "200 OK",
            r#"{"values":[{"uuid":"{a}","build_number":7,"state":{"name":"COMPLETED","result":{"name":"FAILED"}}}]}"#,
        )
        .await;
        let page = client.get_pipelines("acme/api", DEFAULT_PAGE_LEN).await.unwrap();
        assert_eq!(page.values.len(), 1);
        assert_eq!(page.values[0].build_number, Some(7));
    }
}
