//! Bounded revalidation loop over known monograph URLs

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::monograph::{CacheValidators, RevalidationOutcome, RevalidationReport};
use crate::domain::product::CatalogEntry;
use crate::domain::value_objects::ProductIdentifier;
use crate::infrastructure::revalidator::DocumentRevalidator;

/// A catalog entry with a known reference URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationTarget {
    pub din: ProductIdentifier,
    pub reference_url: String,
    pub validators: CacheValidators,
}

impl RevalidationTarget {
    /// `None` for entries that still need discovery
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry) -> Option<Self> {
        let url = entry.reference_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some(Self {
            din: entry.din.clone(),
            reference_url: url.to_string(),
            validators: entry.validators.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationCheck {
    pub target: RevalidationTarget,
    pub report: RevalidationReport,
    pub checked_at: DateTime<Utc>,
}

impl RevalidationCheck {
    /// No status means the request never got a response
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        self.report.status.is_none()
    }
}

#[derive(Clone)]
pub struct RevalidationRunner {
    revalidator: Arc<dyn DocumentRevalidator>,
    concurrency: usize,
}

impl RevalidationRunner {
    /// `concurrency` 1 keeps the loop strictly sequential
    pub fn new(revalidator: Arc<dyn DocumentRevalidator>, concurrency: usize) -> Self {
        Self {
            revalidator,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn revalidate_one(&self, target: RevalidationTarget) -> RevalidationCheck {
        let report = self
            .revalidator
            .revalidate(&target.reference_url, &target.validators)
            .await;
        debug!("Revalidated {} -> {:?}", target.din, report.outcome);
        RevalidationCheck {
            target,
            report,
            checked_at: Utc::now(),
        }
    }

    pub async fn revalidate_batch(&self, targets: Vec<RevalidationTarget>) -> Vec<RevalidationCheck> {
        info!(
            "🔎 Revalidating {} monographs (max concurrent: {})",
            targets.len(),
            self.concurrency
        );

        let checks: Vec<RevalidationCheck> = stream::iter(targets)
            .map(|target| self.revalidate_one(target))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let unchanged = checks
            .iter()
            .filter(|c| c.report.outcome == RevalidationOutcome::Unchanged)
            .count();
        info!("✅ Revalidation finished: {}/{} unchanged", unchanged, checks.len());
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Canned status per URL; unknown URLs fail at the transport level
    struct CannedRevalidator(HashMap<String, u16>);

    #[async_trait]
    impl DocumentRevalidator for CannedRevalidator {
        async fn revalidate(&self, url: &str, _validators: &CacheValidators) -> RevalidationReport {
            match self.0.get(url) {
                Some(&status) => RevalidationReport {
                    status: Some(status),
                    outcome: crate::infrastructure::revalidator::classify_response(
                        &crate::infrastructure::http_client::RawResponse {
                            url: url.to_string(),
                            status,
                            headers: Vec::new(),
                            body: String::new(),
                        },
                    ),
                    headers: Vec::new(),
                },
                None => RevalidationReport::inconclusive(None, Vec::new()),
            }
        }
    }

    fn target(din: &str, url: &str) -> RevalidationTarget {
        RevalidationTarget {
            din: ProductIdentifier::new(din),
            reference_url: url.to_string(),
            validators: CacheValidators::new(Some("\"v\"".into()), None),
        }
    }

    #[tokio::test]
    async fn every_target_gets_a_check() {
        let runner = RevalidationRunner::new(
            Arc::new(CannedRevalidator(HashMap::from([
                ("https://a/1.pdf".to_string(), 304),
                ("https://a/2.pdf".to_string(), 200),
                ("https://a/3.pdf".to_string(), 500),
            ]))),
            1,
        );

        let checks = runner
            .revalidate_batch(vec![
                target("1", "https://a/1.pdf"),
                target("2", "https://a/2.pdf"),
                target("3", "https://a/3.pdf"),
                target("4", "https://a/unreachable.pdf"),
            ])
            .await;

        assert_eq!(checks.len(), 4);
        let by_din: HashMap<_, _> = checks.iter().map(|c| (c.target.din.as_str(), c)).collect();
        assert_eq!(by_din["1"].report.outcome, RevalidationOutcome::Unchanged);
        assert!(matches!(by_din["2"].report.outcome, RevalidationOutcome::Changed(_)));
        assert_eq!(by_din["3"].report.outcome, RevalidationOutcome::Inconclusive);
        assert!(!by_din["3"].is_transport_failure());
        assert!(by_din["4"].is_transport_failure());
    }

    #[test]
    fn entries_without_url_are_not_targets() {
        let entry = CatalogEntry {
            din: ProductIdentifier::new("1"),
            drug_code: None,
            reference_url: Some(" ".into()),
            revision_date: None,
            validators: CacheValidators::default(),
            checked_at: None,
        };
        assert!(RevalidationTarget::from_entry(&entry).is_none());
    }
}
