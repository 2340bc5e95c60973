//! Firecrawl client - web search and page scraping
//!
//! Talks to the Firecrawl v1 REST API:
//! - `POST /v1/search` for broad queries (with page markdown for each hit)
//! - `POST /v1/scrape` for the main content of one URL
//!
//! There is no retry or backoff here. A failed request is reported once and
//! the tool layer turns it into text for the model.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public Firecrawl endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

/// Default timeout for Firecrawl requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of search hits requested
const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Typed errors for the Firecrawl API
#[derive(Debug, thiserror::Error)]
pub enum FirecrawlError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check FIRECRAWL_API_KEY")]
    Unauthorized,

    #[error("Payment required - Firecrawl credits exhausted")]
    PaymentRequired,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("HTTP error ({0}): {1}")]
    Http(u16, String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Firecrawl reported a failure: {0}")]
    Api(String),
}

impl From<reqwest::Error> for FirecrawlError {
    fn from(e: reqwest::Error) -> Self {
        // The URL is our own endpoint, not a page anyone asked for.
        let e = e.without_url();
        if e.is_timeout() {
            FirecrawlError::Timeout
        } else if e.is_connect() {
            FirecrawlError::Connection(e.to_string())
        } else if e.is_decode() {
            FirecrawlError::Parse(e.to_string())
        } else {
            FirecrawlError::Network(e.to_string())
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Page text, present when the search also scraped the page.
    #[serde(default)]
    pub markdown: Option<String>,
}

/// Main content of a scraped page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
}

/// The external fetch behind the `search` and `crawl` tools.
///
/// `FirecrawlClient` is the real implementation. Tests plug in their own.
#[async_trait]
pub trait WebBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FirecrawlError>;

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, FirecrawlError>;
}

/// HTTP client for Firecrawl.
///
/// # Example
/// ```ignore
/// let client = FirecrawlClient::new("fc-...").with_search_limit(3);
/// let hits = client.search("Acme Corp product launch").await?;
/// ```
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    api_key: String,
    base_url: String,
    client: Client,
    timeout: Duration,
    search_limit: usize,
}

impl FirecrawlClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Point the client at another deployment (self-hosted Firecrawl, or a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, FirecrawlError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Calling Firecrawl");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let envelope: Envelope<R> = response
                .json()
                .await
                .map_err(|e| FirecrawlError::Parse(e.to_string()))?;
            return envelope.into_data();
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(FirecrawlError::Unauthorized),
            402 => Err(FirecrawlError::PaymentRequired),
            429 => Err(FirecrawlError::RateLimited),
            code => Err(FirecrawlError::Http(code, error_text)),
        }
    }
}

#[async_trait]
impl WebBackend for FirecrawlClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FirecrawlError> {
        let request = SearchRequest {
            query,
            limit: self.search_limit,
            scrape_options: ScrapeOptions {
                formats: &["markdown"],
            },
        };
        self.post("/v1/search", &request).await
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedPage, FirecrawlError> {
        let request = ScrapeRequest {
            url,
            formats: &["markdown"],
            only_main_content: true,
        };
        let data: ScrapeData = self.post("/v1/scrape", &request).await?;

        Ok(ScrapedPage {
            url: data
                .metadata
                .as_ref()
                .and_then(|m| m.source_url.clone())
                .unwrap_or_else(|| url.to_string()),
            title: data.metadata.and_then(|m| m.title),
            markdown: data.markdown.unwrap_or_default(),
        })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: &'static [&'static str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'static [&'static str],
    only_main_content: bool,
}

/// `{"success": bool, "data": ..., "error": ...}` wrapper on every response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, FirecrawlError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(FirecrawlError::Parse("response has no data".to_string())),
            (false, _) => Err(FirecrawlError::Api(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Debug, Deserialize)]
struct PageMetadata {
    title: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let client = FirecrawlClient::new("fc-test")
            .with_base_url("http://localhost:3002/")
            .with_timeout(Duration::from_secs(5))
            .with_search_limit(0);

        assert_eq!(client.base_url, "http://localhost:3002");
        assert_eq!(client.timeout, Duration::from_secs(5));
        assert_eq!(client.search_limit, 1);
    }

    #[test]
    fn test_search_request_wire_format() {
        let request = SearchRequest {
            query: "acme",
            limit: 3,
            scrape_options: ScrapeOptions {
                formats: &["markdown"],
            },
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["query"], "acme");
        assert_eq!(json["limit"], 3);
        assert_eq!(json["scrapeOptions"]["formats"][0], "markdown");
    }

    #[test]
    fn test_envelope_failure() {
        let envelope: Envelope<Vec<SearchHit>> =
            serde_json::from_str(r#"{"success": false, "error": "bad query"}"#).unwrap();

        let err = envelope.into_data().unwrap_err();
        assert!(matches!(err, FirecrawlError::Api(ref msg) if msg == "bad query"));
    }
}

/// HTTP tests against a mocked Firecrawl server
#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FirecrawlClient {
        FirecrawlClient::new("fc-test")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_search_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .and(header("Authorization", "Bearer fc-test"))
            .and(body_partial_json(serde_json::json!({"query": "Acme launch", "limit": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [
                    {
                        "url": "https://acme.example/launch",
                        "title": "Acme launches Rocket",
                        "description": "Press release",
                        "markdown": "# Rocket\nNow shipping."
                    },
                    { "url": "https://news.example/acme" }
                ]
            })))
            .mount(&server)
            .await;

        let hits = client_for(&server).search("Acme launch").await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title.as_deref(), Some("Acme launches Rocket"));
        assert_eq!(hits[1].url, "https://news.example/acme");
        assert!(hits[1].markdown.is_none());
    }

    #[tokio::test]
    async fn test_scrape_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://acme.example/launch",
                "onlyMainContent": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "markdown": "# Rocket\nNow shipping.",
                    "metadata": { "title": "Rocket", "sourceURL": "https://acme.example/launch" }
                }
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .scrape("https://acme.example/launch")
            .await
            .unwrap();

        assert_eq!(page.title.as_deref(), Some("Rocket"));
        assert!(page.markdown.contains("Now shipping."));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("x").await.unwrap_err();
        assert!(matches!(err, FirecrawlError::Unauthorized));
    }

    #[tokio::test]
    async fn test_rate_limited_and_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.search("x").await.unwrap_err(),
            FirecrawlError::RateLimited
        ));
        assert!(matches!(
            client.scrape("https://a.example").await.unwrap_err(),
            FirecrawlError::Http(503, ref body) if body == "down"
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop, so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = FirecrawlClient::new("fc-test")
            .with_base_url(format!("http://127.0.0.1:{}", port))
            .with_timeout(Duration::from_secs(2));

        let err = client.search("x").await.unwrap_err();
        assert!(matches!(
            err,
            FirecrawlError::Connection(_) | FirecrawlError::Network(_) | FirecrawlError::Timeout
        ));
        // The endpoint never leaks into the error text agents see.
        assert!(!err.to_string().contains("127.0.0.1"));
        assert!(!err.to_string().contains("/v1/search"));
    }
}
