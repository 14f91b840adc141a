//! Product index page fetcher

use async_trait::async_trait;
use url::Url;

use crate::domain::value_objects::SourceCode;
use crate::infrastructure::config::dpd;
use crate::infrastructure::http_client::{FetchError, MonographHttpClient};

/// Status and markup of an index page. Non-200 bodies may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// Final page URL after redirects; relative links resolve against it
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    /// Only 200 carries a usable index page; any other status is a miss
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Fetches the index page for one source code
#[async_trait]
pub trait MonographPageFetcher: Send + Sync {
    /// `Err` only when no response was received at all
    async fn fetch(&self, code: &SourceCode) -> Result<PageResponse, FetchError>;
}

/// `GET {base}/pm-mp.do?lang=en&code={code}` over the shared client
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: MonographHttpClient,
    base_url: String,
}

impl HttpPageFetcher {
    pub fn new(client: MonographHttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Deterministic page URL for a source code
    pub fn page_url(&self, code: &SourceCode) -> Result<Url, FetchError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), dpd::MONOGRAPH_PAGE_PATH);
        let mut url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("lang", "en")
            .append_pair("code", code.as_str());
        Ok(url)
    }
}

#[async_trait]
impl MonographPageFetcher for HttpPageFetcher {
    async fn fetch(&self, code: &SourceCode) -> Result<PageResponse, FetchError> {
        let url = self.page_url(code)?;
        let response = self.client.get_page(url.as_str()).await?;
        Ok(PageResponse {
            url: response.url,
            status: response.status,
            body: response.body,
        })
    }
}
