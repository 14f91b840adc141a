//! HTTP client for monograph discovery and revalidation
//!
//! One explicitly constructed client per run: fixed user agent, bounded
//! redirects, per-request timeouts and an optional requests-per-second
//! quota. Non-2xx statuses are returned to the caller, not raised; only a
//! request that never produced a response is an error.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, redirect};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::monograph::CacheValidators;
use crate::infrastructure::config::HttpConfig;

/// Errors raised before any HTTP status was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl FetchError {
    fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::InvalidUrl {
                url: url.to_string(),
                reason: error.to_string(),
            };
        }
        Self::Transport {
            url: url.to_string(),
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timed_out: true, .. })
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub page_timeout: Duration,
    pub head_timeout: Duration,
    pub max_redirects: usize,
    pub max_requests_per_second: u32,
}

impl From<&HttpConfig> for HttpClientConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            head_timeout: Duration::from_secs(config.head_timeout_secs),
            max_redirects: config.max_redirects,
            max_requests_per_second: config.max_requests_per_second,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// Status, headers and (for GET) body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Rate-limited HTTP client shared by page fetches and conditional checks
#[derive(Clone)]
pub struct MonographHttpClient {
    client: Client,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
    config: HttpClientConfig,
}

impl MonographHttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .connect_timeout(config.page_timeout.min(config.head_timeout))
            .gzip(true)
            .build()
            .map_err(|e| FetchError::ClientBuild { message: e.to_string() })?;

        let rate_limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub fn from_http_config(config: &HttpConfig) -> Result<Self, FetchError> {
        Self::new(HttpClientConfig::from(config))
    }

    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn wait_for_quota(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    /// GET `url` and read the body as text. Any status is returned.
    pub async fn get_page(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.wait_for_quota().await;
        debug!("🌐 HTTP GET: {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.config.page_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        // A body that cannot be read after a non-2xx status is irrelevant
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) if (200..300).contains(&status) => return Err(FetchError::from_reqwest(url, &e)),
            Err(e) => {
                debug!("Ignoring unreadable body for {} ({}): {}", url, status, e);
                String::new()
            }
        };

        Ok(RawResponse {
            url: final_url,
            status,
            headers,
            body,
        })
    }

    /// GET raw bytes for extract archives; non-2xx is an error here
    pub async fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self.wait_for_quota().await;
        debug!("🌐 HTTP GET (download): {}", url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        Ok(bytes.to_vec())
    }

    /// Conditional HEAD built from stored validators; absent ones are omitted
    pub async fn head_conditional(&self, url: &str, validators: &CacheValidators) -> Result<RawResponse, FetchError> {
        self.wait_for_quota().await;

        let conditions = conditional_headers(validators);
        debug!("🌐 HTTP HEAD: {} ({} preconditions)", url, conditions.len());

        let response = self
            .client
            .head(url)
            .headers(conditions)
            .timeout(self.config.head_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(RawResponse {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
            body: String::new(),
        })
    }
}

/// `If-None-Match` from the etag, `If-Modified-Since` from last-modified.
/// A stored value that is not a valid header is dropped with a warning.
pub fn conditional_headers(validators: &CacheValidators) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (IF_NONE_MATCH, validators.etag.as_deref()),
        (IF_MODIFIED_SINCE, validators.last_modified.as_deref()),
    ] {
        let Some(value) = value else { continue };
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                headers.insert(name, header_value);
            }
            Err(_) => warn!("Skipping invalid {} validator: {:?}", name, value),
        }
    }
    headers
}

fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> MonographHttpClient {
        MonographHttpClient::new(HttpClientConfig {
            page_timeout: Duration::from_millis(500),
            head_timeout: Duration::from_millis(500),
            max_requests_per_second: 0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn http_client_creation() {
        let client = MonographHttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn absent_validators_are_omitted() {
        assert!(conditional_headers(&CacheValidators::default()).is_empty());

        let only_etag = conditional_headers(&CacheValidators::new(Some("\"abc\"".into()), None));
        assert_eq!(only_etag.get(IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert!(only_etag.get(IF_MODIFIED_SINCE).is_none());
    }

    #[test]
    fn invalid_validator_value_is_dropped() {
        let headers = conditional_headers(&CacheValidators::new(Some("bad\nvalue".into()), Some("Mon, 01 Jan 2024 00:00:00 GMT".into())));
        assert!(headers.get(IF_NONE_MATCH).is_none());
        assert!(headers.get(IF_MODIFIED_SINCE).is_some());
    }

    #[tokio::test]
    async fn get_sends_identifying_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", crate::infrastructure::config::defaults::USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let response = test_client().get_page(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let response = test_client().get_page(&format!("{}/nope", server.uri())).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "missing");
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let err = test_client().get_page(&server.uri()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn final_url_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dpd-bdpp/old.do"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/dpd-bdpp/pm-mp.do?code=1"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dpd-bdpp/pm-mp.do"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Page-Kind", "index")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let response = test_client()
            .get_page(&format!("{}/dpd-bdpp/old.do", server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.url, format!("{}/dpd-bdpp/pm-mp.do?code=1", server.uri()));
        assert_eq!(response.header("x-page-kind"), Some("index"));
    }

    #[tokio::test]
    async fn redirect_loop_terminates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let err = test_client().get_page(&format!("{}/loop", server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { timed_out: false, .. }));
    }

    #[tokio::test]
    async fn head_sends_preconditions() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/doc.pdf"))
            .and(header("if-none-match", "\"abc\""))
            .and(header("if-modified-since", "Wed, 01 May 2024 10:00:00 GMT"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let validators = CacheValidators::new(
            Some("\"abc\"".into()),
            Some("Wed, 01 May 2024 10:00:00 GMT".into()),
        );
        let response = test_client()
            .head_conditional(&format!("{}/doc.pdf", server.uri()), &validators)
            .await
            .unwrap();
        assert_eq!(response.status, 304);
    }

    #[tokio::test]
    async fn download_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = test_client()
            .download(&format!("{}/drug.zip", server.uri()), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_failure() {
        // Port 9 (discard) on localhost is closed in test environments
        let err = test_client().get_page("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
