//! Monograph discovery: map, fetch and extract, fanned out under a cap
//!
//! Each identifier runs in its own task and always ends in a typed outcome.
//! The concurrency cap is a politeness limit toward the source site.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::application::identifier_mapper::IdentifierMapper;
use crate::domain::monograph::{DiscoveryOutcome, DiscoveryResult};
use crate::domain::value_objects::{ProductIdentifier, SourceCode};
use crate::infrastructure::page_fetcher::MonographPageFetcher;
use crate::infrastructure::parsing::MonographPageParser;

/// Outcome of one identifier plus the moment its check completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRecord {
    pub outcome: DiscoveryOutcome,
    pub checked_at: DateTime<Utc>,
}

impl DiscoveryRecord {
    #[must_use]
    pub fn result(&self) -> DiscoveryResult {
        self.outcome.result()
    }
}

#[derive(Clone)]
pub struct DiscoveryOrchestrator {
    fetcher: Arc<dyn MonographPageFetcher>,
    parser: Arc<MonographPageParser>,
    mapper: Arc<IdentifierMapper>,
}

impl DiscoveryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn MonographPageFetcher>,
        parser: Arc<MonographPageParser>,
        mapper: Arc<IdentifierMapper>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            mapper,
        }
    }

    /// Full pipeline for one identifier
    pub async fn discover_one(&self, din: &ProductIdentifier) -> DiscoveryOutcome {
        let Some(code) = self.mapper.map(din) else {
            debug!("No drug code for DIN {}; skipping", din);
            return DiscoveryOutcome::Unmapped;
        };
        resolve(self.fetcher.as_ref(), &self.parser, code).await
    }

    /// Resolve every identifier, at most `concurrency_limit` fetches in flight.
    /// Returns once all identifiers reached a terminal outcome.
    pub async fn discover_batch(
        &self,
        identifiers: Vec<ProductIdentifier>,
        concurrency_limit: usize,
    ) -> HashMap<ProductIdentifier, DiscoveryRecord> {
        let max_concurrent = concurrency_limit.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let mut seen = HashSet::new();
        let identifiers: Vec<_> = identifiers.into_iter().filter(|din| seen.insert(din.clone())).collect();

        info!(
            "🚀 Discovering monographs for {} identifiers (max concurrent: {})",
            identifiers.len(),
            max_concurrent
        );

        let mut tasks = Vec::with_capacity(identifiers.len());
        for din in &identifiers {
            let orchestrator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let din = din.clone();

            tasks.push(tokio::spawn(async move {
                // Unmapped identifiers never touch the network or a permit
                let Some(code) = orchestrator.mapper.map(&din).cloned() else {
                    return (DiscoveryOutcome::Unmapped, Utc::now());
                };
                let Ok(_permit) = semaphore.acquire().await else {
                    let outcome = DiscoveryOutcome::TransportFailure {
                        message: "discovery semaphore closed".to_string(),
                    };
                    return (outcome, Utc::now());
                };
                let outcome = resolve(orchestrator.fetcher.as_ref(), &orchestrator.parser, &code).await;
                (outcome, Utc::now())
            }));
        }

        let results = join_all(tasks).await;

        let mut records = HashMap::with_capacity(identifiers.len());
        for (din, joined) in identifiers.into_iter().zip(results) {
            let (outcome, checked_at) = joined.unwrap_or_else(|e| {
                warn!("❌ Discovery task for {} failed: {}", din, e);
                (DiscoveryOutcome::TransportFailure { message: e.to_string() }, Utc::now())
            });
            records.insert(din, DiscoveryRecord { outcome, checked_at });
        }

        let discovered = records.values().filter(|r| r.outcome.is_discovered()).count();
        info!("✅ Discovery batch finished: {}/{} discovered", discovered, records.len());
        records
    }
}

async fn resolve(fetcher: &dyn MonographPageFetcher, parser: &MonographPageParser, code: &SourceCode) -> DiscoveryOutcome {
    let page = match fetcher.fetch(code).await {
        Ok(page) => page,
        Err(e) if e.is_timeout() => {
            warn!("⏱️ Index page fetch timed out for code {}: {}", code, e);
            return DiscoveryOutcome::TransportFailure { message: e.to_string() };
        }
        Err(e) => {
            warn!("Index page fetch failed for code {}: {}", code, e);
            return DiscoveryOutcome::TransportFailure { message: e.to_string() };
        }
    };

    if !page.is_success() {
        debug!("Index page for code {} answered {}", code, page.status);
        return DiscoveryOutcome::NotFound { status: page.status };
    }

    let result = parser.extract_from_page(&page.body, &page.url);
    if result.is_empty() {
        debug!("No monograph link on index page for code {}", code);
        DiscoveryOutcome::ParseMiss
    } else {
        debug!("Monograph for code {}: {:?}", code, result.reference_url);
        DiscoveryOutcome::Discovered(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::FetchError;
    use crate::infrastructure::page_fetcher::PageResponse;
    use async_trait::async_trait;

    /// Serves canned pages keyed by source code
    struct CannedFetcher(HashMap<String, Result<PageResponse, FetchError>>);

    #[async_trait]
    impl MonographPageFetcher for CannedFetcher {
        async fn fetch(&self, code: &SourceCode) -> Result<PageResponse, FetchError> {
            self.0.get(code.as_str()).cloned().unwrap_or_else(|| page(404, ""))
        }
    }

    const INDEX_PAGE: &str = "https://health-products.canada.ca/dpd-bdpp/pm-mp.do?lang=en&code=1";

    fn page(status: u16, body: &str) -> Result<PageResponse, FetchError> {
        Ok(PageResponse {
            url: INDEX_PAGE.to_string(),
            status,
            body: body.to_string(),
        })
    }

    fn ok(body: &str) -> Result<PageResponse, FetchError> {
        page(200, body)
    }

    fn orchestrator(pages: Vec<(&str, Result<PageResponse, FetchError>)>) -> DiscoveryOrchestrator {
        let mapper = IdentifierMapper::from_pairs(
            pages
                .iter()
                .map(|(code, _)| (ProductIdentifier::new(format!("din-{code}")), SourceCode::parse(code))),
        );
        DiscoveryOrchestrator::new(
            Arc::new(CannedFetcher(
                pages.into_iter().map(|(code, page)| (code.to_string(), page)).collect(),
            )),
            Arc::new(MonographPageParser::new().unwrap()),
            Arc::new(mapper),
        )
    }

    #[tokio::test]
    async fn outcomes_are_typed_per_failure_kind() {
        let orchestrator = orchestrator(vec![
            ("1", ok(r#"<a href="/pm/00001_eng.pdf">PM</a> Revision Date: 2023-05-14"#)),
            ("2", ok("<p>no documents</p>")),
            ("3", page(500, "")),
            (
                "4",
                Err(FetchError::Transport {
                    url: "https://example.org".into(),
                    message: "connection reset".into(),
                    timed_out: false,
                }),
            ),
        ]);

        let ids = ["din-1", "din-2", "din-3", "din-4", "unknown"]
            .into_iter()
            .map(ProductIdentifier::new)
            .collect();
        let records = orchestrator.discover_batch(ids, 2).await;
        let kind = |din: &str| records[&ProductIdentifier::new(din)].outcome.kind();

        assert_eq!(records.len(), 5);
        assert_eq!(kind("din-1"), "discovered");
        assert_eq!(kind("din-2"), "parse_miss");
        assert_eq!(kind("din-3"), "not_found");
        assert_eq!(kind("din-4"), "transport_failure");
        assert_eq!(kind("unknown"), "unmapped");

        let found = records[&ProductIdentifier::new("din-1")].result();
        assert_eq!(found.revision_date.as_deref(), Some("2023-05-14"));
        assert!(found.reference_url.unwrap().ends_with("00001_eng.pdf"));
    }

    #[tokio::test]
    async fn only_status_200_counts_as_an_index_page() {
        let orchestrator = orchestrator(vec![("5", page(204, r#"<a href="pm/5_eng.pdf">PM</a>"#))]);
        let outcome = orchestrator.discover_one(&ProductIdentifier::new("din-5")).await;
        assert_eq!(outcome, DiscoveryOutcome::NotFound { status: 204 });
    }

    #[tokio::test]
    async fn relative_links_resolve_against_the_fetched_page() {
        let orchestrator = orchestrator(vec![("6", ok(r#"<a href="pm/00006_eng.pdf">PM</a>"#))]);
        let outcome = orchestrator.discover_one(&ProductIdentifier::new("din-6")).await;
        assert_eq!(
            outcome.result().reference_url.as_deref(),
            Some("https://health-products.canada.ca/dpd-bdpp/pm/00006_eng.pdf")
        );
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_resolved_once() {
        let orchestrator = orchestrator(vec![("1", ok(r#"<a href="a.pdf">x</a>"#))]);
        let ids = vec![ProductIdentifier::new("din-1"), ProductIdentifier::new("din-1")];
        let records = orchestrator.discover_batch(ids, 10).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn discover_one_matches_batch() {
        let orchestrator = orchestrator(vec![("7", ok(r#"<a href="https://health-products.canada.ca/pm/7_eng.pdf">x</a>"#))]);
        let din = ProductIdentifier::new("din-7");
        let single = orchestrator.discover_one(&din).await;
        let batch = orchestrator.discover_batch(vec![din.clone()], 1).await;
        assert_eq!(single, batch[&din].outcome);
    }
}
