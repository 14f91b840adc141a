//! Conditional HEAD revalidation of known monograph URLs
//!
//! 304 means unchanged, 200 means changed with the response's validators,
//! anything else (including no response) is inconclusive.

use async_trait::async_trait;
use reqwest::header::{ETAG, LAST_MODIFIED};
use tracing::{debug, warn};

use crate::domain::monograph::{CacheValidators, RevalidationOutcome, RevalidationReport};
use crate::infrastructure::http_client::{MonographHttpClient, RawResponse};

/// Checks one reference URL against its stored validators
#[async_trait]
pub trait DocumentRevalidator: Send + Sync {
    /// Never fails; a transport failure is an inconclusive report with no status
    async fn revalidate(&self, url: &str, validators: &CacheValidators) -> RevalidationReport;
}

/// Map a HEAD response to an outcome
#[must_use]
pub fn classify_response(response: &RawResponse) -> RevalidationOutcome {
    match response.status {
        304 => RevalidationOutcome::Unchanged,
        200 => RevalidationOutcome::Changed(CacheValidators::new(
            response.header(ETAG.as_str()).map(str::to_string),
            response.header(LAST_MODIFIED.as_str()).map(str::to_string),
        )),
        _ => RevalidationOutcome::Inconclusive,
    }
}

#[derive(Clone)]
pub struct HttpRevalidator {
    client: MonographHttpClient,
}

impl HttpRevalidator {
    pub const fn new(client: MonographHttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentRevalidator for HttpRevalidator {
    async fn revalidate(&self, url: &str, validators: &CacheValidators) -> RevalidationReport {
        match self.client.head_conditional(url, validators).await {
            Ok(response) => {
                let outcome = classify_response(&response);
                debug!("HEAD {} -> {} ({:?})", url, response.status, outcome);
                RevalidationReport {
                    status: Some(response.status),
                    outcome,
                    headers: response.headers,
                }
            }
            Err(e) => {
                warn!("Revalidation transport failure: {}", e);
                RevalidationReport::inconclusive(None, Vec::new())
            }
        }
    }
}
