//! Monograph discovery and revalidation types
//!
//! A monograph is the product's reference PDF. Discovery finds its URL and
//! declared revision date; revalidation checks the URL with HTTP cache
//! validators. URL and validators always travel together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::ProductIdentifier;

/// Best candidate found on a product's index page
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryResult {
    #[serde(rename = "referenceUrl")]
    pub reference_url: Option<String>,
    /// ISO-8601 date (`YYYY-MM-DD`); only present alongside a URL
    #[serde(rename = "revisionDate")]
    pub revision_date: Option<String>,
}

impl DiscoveryResult {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            reference_url: None,
            revision_date: None,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reference_url.is_none()
    }
}

/// Per-identifier discovery outcome. Only `Discovered` carries a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Discovered(DiscoveryResult),
    /// No source code is known for the identifier
    Unmapped,
    /// The index page answered with a non-2xx status
    NotFound { status: u16 },
    /// Timeout, DNS failure, connection reset
    TransportFailure { message: String },
    /// Markup fetched but no reference document link in it
    ParseMiss,
}

impl DiscoveryOutcome {
    /// Collapses the outcome into the plain result handed to the catalog
    #[must_use]
    pub fn into_result(self) -> DiscoveryResult {
        match self {
            Self::Discovered(result) => result,
            _ => DiscoveryResult::empty(),
        }
    }

    #[must_use]
    pub fn result(&self) -> DiscoveryResult {
        match self {
            Self::Discovered(result) => result.clone(),
            _ => DiscoveryResult::empty(),
        }
    }

    #[must_use]
    pub const fn is_discovered(&self) -> bool {
        matches!(self, Self::Discovered(_))
    }

    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Discovered(_) => "discovered",
            Self::Unmapped => "unmapped",
            Self::NotFound { .. } => "not_found",
            Self::TransportFailure { .. } => "transport_failure",
            Self::ParseMiss => "parse_miss",
        }
    }
}

/// HTTP change-detection tokens attached to a reference URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheValidators {
    pub etag: Option<String>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
}

impl CacheValidators {
    #[must_use]
    pub fn new(etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag: etag.filter(|v| !v.trim().is_empty()),
            last_modified: last_modified.filter(|v| !v.trim().is_empty()),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Result of a conditional HEAD against a known reference URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "validators")]
pub enum RevalidationOutcome {
    /// 304: stored validators stay as they are
    Unchanged,
    /// 200: stored validators are replaced wholesale
    Changed(CacheValidators),
    /// Any other status or a transport failure: validators untouched
    Inconclusive,
}

/// Status, outcome and raw response headers of one revalidation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationReport {
    /// `None` when the request never produced a response
    pub status: Option<u16>,
    pub outcome: RevalidationOutcome,
    pub headers: Vec<(String, String)>,
}

impl RevalidationReport {
    #[must_use]
    pub const fn inconclusive(status: Option<u16>, headers: Vec<(String, String)>) -> Self {
        Self {
            status,
            outcome: RevalidationOutcome::Inconclusive,
            headers,
        }
    }
}

/// Field-level change a single check applies to a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonographChange {
    /// Nothing but the check timestamp changes
    CheckedOnly,
    /// A (new) reference URL; validators are cleared with it
    Discovered {
        reference_url: String,
        revision_date: Option<String>,
    },
    /// Same URL, fresh validators; revision date only if rediscovered
    Refreshed {
        validators: CacheValidators,
        revision_date: Option<String>,
    },
}

/// Keyed update handed to the catalog store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonographUpdate {
    pub din: ProductIdentifier,
    pub change: MonographChange,
    #[serde(rename = "checkedAt")]
    pub checked_at: DateTime<Utc>,
}

impl MonographUpdate {
    #[must_use]
    pub fn from_discovery(din: ProductIdentifier, result: DiscoveryResult, checked_at: DateTime<Utc>) -> Self {
        let change = match result.reference_url {
            Some(reference_url) => MonographChange::Discovered {
                reference_url,
                revision_date: result.revision_date,
            },
            None => MonographChange::CheckedOnly,
        };
        Self {
            din,
            change,
            checked_at,
        }
    }

    #[must_use]
    pub fn from_revalidation(
        din: ProductIdentifier,
        outcome: &RevalidationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let change = match outcome {
            RevalidationOutcome::Changed(validators) => MonographChange::Refreshed {
                validators: validators.clone(),
                revision_date: None,
            },
            RevalidationOutcome::Unchanged | RevalidationOutcome::Inconclusive => {
                MonographChange::CheckedOnly
            }
        };
        Self {
            din,
            change,
            checked_at,
        }
    }
}
