//! Monograph sync runs: discover missing links, revalidate known ones
//!
//! Each run reads a catalog snapshot, computes updates without holding a
//! transaction, and hands one batch back to the store.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::discovery::DiscoveryOrchestrator;
use crate::application::identifier_mapper::IdentifierMapper;
use crate::application::revalidation::{RevalidationCheck, RevalidationRunner, RevalidationTarget};
use crate::domain::monograph::{DiscoveryOutcome, MonographChange, MonographUpdate, RevalidationOutcome};
use crate::domain::product::CatalogEntry;
use crate::domain::repositories::CatalogStore;
use crate::domain::summary::RunSummary;
use crate::domain::value_objects::ProductIdentifier;
use crate::infrastructure::config::{DiscoveryConfig, RevalidationConfig};
use crate::infrastructure::page_fetcher::MonographPageFetcher;
use crate::infrastructure::parsing::MonographPageParser;
use crate::infrastructure::revalidator::DocumentRevalidator;

pub struct MonographSyncService {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn MonographPageFetcher>,
    revalidator: Arc<dyn DocumentRevalidator>,
    parser: Arc<MonographPageParser>,
    discovery: DiscoveryConfig,
    revalidation: RevalidationConfig,
}

impl MonographSyncService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn MonographPageFetcher>,
        revalidator: Arc<dyn DocumentRevalidator>,
        parser: Arc<MonographPageParser>,
        discovery: DiscoveryConfig,
        revalidation: RevalidationConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            revalidator,
            parser,
            discovery,
            revalidation,
        }
    }

    fn orchestrator(&self, snapshot: &[CatalogEntry]) -> DiscoveryOrchestrator {
        let mapper = IdentifierMapper::from_entries(snapshot);
        debug!("Identifier mapper built with {} codes", mapper.len());
        DiscoveryOrchestrator::new(Arc::clone(&self.fetcher), Arc::clone(&self.parser), Arc::new(mapper))
    }

    /// Discover monographs for entries that have none
    pub async fn discover_missing(&self, limit: Option<usize>) -> Result<RunSummary> {
        let snapshot = self.store.load_snapshot().await.context("Failed to load catalog snapshot")?;
        self.discover_in(&snapshot, limit.or(self.discovery.batch_limit)).await
    }

    async fn discover_in(&self, snapshot: &[CatalogEntry], limit: Option<usize>) -> Result<RunSummary> {
        let mut summary = RunSummary::start();
        let identifiers: Vec<ProductIdentifier> = snapshot
            .iter()
            .filter(|entry| entry.needs_discovery())
            .map(|entry| entry.din.clone())
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        if identifiers.is_empty() {
            info!("No catalog entries need discovery");
            return Ok(summary.finish());
        }

        let records = self
            .orchestrator(snapshot)
            .discover_batch(identifiers, self.discovery.concurrency)
            .await;

        let mut updates = Vec::with_capacity(records.len());
        for (din, record) in records {
            summary.record_discovery(&record.outcome);
            updates.push(MonographUpdate::from_discovery(din, record.outcome.into_result(), record.checked_at));
        }

        self.store
            .apply_monograph_updates(&updates)
            .await
            .context("Failed to write discovery results")?;

        let summary = summary.finish();
        info!(
            "📊 Discovery run {}: attempted={} discovered={} still_missing={} transport_failures={}",
            summary.run_id, summary.attempted, summary.discovered, summary.still_missing, summary.transport_failures
        );
        Ok(summary)
    }

    /// Conditional checks for entries with a known monograph
    pub async fn revalidate_known(&self, limit: Option<usize>) -> Result<RunSummary> {
        let snapshot = self.store.load_snapshot().await.context("Failed to load catalog snapshot")?;
        self.revalidate_in(&snapshot, limit.or(self.revalidation.batch_limit)).await
    }

    async fn revalidate_in(&self, snapshot: &[CatalogEntry], limit: Option<usize>) -> Result<RunSummary> {
        let mut summary = RunSummary::start();
        let targets: Vec<RevalidationTarget> = snapshot
            .iter()
            .filter_map(RevalidationTarget::from_entry)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        if targets.is_empty() {
            info!("No catalog entries to revalidate");
            return Ok(summary.finish());
        }

        let runner = RevalidationRunner::new(Arc::clone(&self.revalidator), self.revalidation.concurrency);
        let checks = runner.revalidate_batch(targets).await;

        let orchestrator = self
            .revalidation
            .rediscover_on_change
            .then(|| self.orchestrator(snapshot));

        let mut updates = Vec::with_capacity(checks.len());
        for check in checks {
            summary.record_revalidation(&check.report.outcome, check.is_transport_failure());
            let update = match (&check.report.outcome, &orchestrator) {
                (RevalidationOutcome::Changed(_), Some(orchestrator)) => {
                    let outcome = orchestrator.discover_one(&check.target.din).await;
                    let (update, relocated) = rediscovered_update(&check, outcome);
                    if relocated {
                        summary.relocated += 1;
                    }
                    update
                }
                (outcome, _) => MonographUpdate::from_revalidation(check.target.din.clone(), outcome, check.checked_at),
            };
            updates.push(update);
        }

        self.store
            .apply_monograph_updates(&updates)
            .await
            .context("Failed to write revalidation results")?;

        let summary = summary.finish();
        info!(
            "📊 Revalidation run {}: attempted={} unchanged={} changed={} inconclusive={} relocated={}",
            summary.run_id,
            summary.attempted,
            summary.unchanged,
            summary.changed,
            summary.inconclusive,
            summary.relocated
        );
        Ok(summary)
    }

    /// Discovery then revalidation over one snapshot. Links discovered in
    /// this run are first revalidated by the next one.
    pub async fn sync(&self, limit: Option<usize>) -> Result<RunSummary> {
        let snapshot = self.store.load_snapshot().await.context("Failed to load catalog snapshot")?;

        let mut summary = RunSummary::start();
        summary.merge(&self.discover_in(&snapshot, limit.or(self.discovery.batch_limit)).await?);
        summary.merge(
            &self
                .revalidate_in(&snapshot, limit.or(self.revalidation.batch_limit))
                .await?,
        );
        Ok(summary.finish())
    }
}

/// Update for a changed document after rediscovery; `true` when the URL moved
fn rediscovered_update(check: &RevalidationCheck, outcome: DiscoveryOutcome) -> (MonographUpdate, bool) {
    let RevalidationOutcome::Changed(validators) = &check.report.outcome else {
        return (
            MonographUpdate::from_revalidation(check.target.din.clone(), &check.report.outcome, check.checked_at),
            false,
        );
    };

    let result = outcome.into_result();
    let (change, relocated) = match result.reference_url {
        Some(url) if url != check.target.reference_url => (
            MonographChange::Discovered {
                reference_url: url,
                revision_date: result.revision_date,
            },
            true,
        ),
        Some(_) => (
            MonographChange::Refreshed {
                validators: validators.clone(),
                revision_date: result.revision_date,
            },
            false,
        ),
        None => (
            MonographChange::Refreshed {
                validators: validators.clone(),
                revision_date: None,
            },
            false,
        ),
    };

    (
        MonographUpdate {
            din: check.target.din.clone(),
            change,
            checked_at: check.checked_at,
        },
        relocated,
    )
}
