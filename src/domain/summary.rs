use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::monograph::{DiscoveryOutcome, RevalidationOutcome};

/// Per-run counters. Every attempted identifier lands in exactly one of
/// `discovered`, `still_missing`, `unchanged`, `changed`, `inconclusive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempted: u32,
    pub discovered: u32,
    pub still_missing: u32,
    pub unchanged: u32,
    pub changed: u32,
    pub inconclusive: u32,
    /// Subset of `still_missing`/`inconclusive` caused by network failures
    pub transport_failures: u32,
    /// Subset of `changed` whose URL was replaced by rediscovery
    pub relocated: u32,
}

impl RunSummary {
    #[must_use]
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            attempted: 0,
            discovered: 0,
            still_missing: 0,
            unchanged: 0,
            changed: 0,
            inconclusive: 0,
            transport_failures: 0,
            relocated: 0,
        }
    }

    pub fn record_discovery(&mut self, outcome: &DiscoveryOutcome) {
        self.attempted += 1;
        if outcome.is_discovered() {
            self.discovered += 1;
        } else {
            self.still_missing += 1;
        }
        if outcome.is_transport_failure() {
            self.transport_failures += 1;
        }
    }

    pub fn record_revalidation(&mut self, outcome: &RevalidationOutcome, transport_failure: bool) {
        self.attempted += 1;
        match outcome {
            RevalidationOutcome::Unchanged => self.unchanged += 1,
            RevalidationOutcome::Changed(_) => self.changed += 1,
            RevalidationOutcome::Inconclusive => self.inconclusive += 1,
        }
        if transport_failure {
            self.transport_failures += 1;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.attempted += other.attempted;
        self.discovered += other.discovered;
        self.still_missing += other.still_missing;
        self.unchanged += other.unchanged;
        self.changed += other.changed;
        self.inconclusive += other.inconclusive;
        self.transport_failures += other.transport_failures;
        self.relocated += other.relocated;
    }

    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Sum of the terminal buckets; equals `attempted` for a consistent run
    #[must_use]
    pub const fn terminal_total(&self) -> u32 {
        self.discovered + self.still_missing + self.unchanged + self.changed + self.inconclusive
    }
}
