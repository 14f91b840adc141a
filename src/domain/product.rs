use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::monograph::CacheValidators;
use super::value_objects::{ProductIdentifier, SourceCode};

/// Catalog row built from the DPD extract (product columns only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub din: ProductIdentifier,
    pub drug_code: String,
    pub brand_name: String,
    pub dosage_form: String,
    pub route: String,
    pub strength: String,
    pub active_ingredient: String,
    pub manufacturer: String,
    pub schedule: String,
    pub class: String,
    pub status: String,
    /// Product information page on the source site (not the monograph PDF)
    #[serde(rename = "productInfoUrl")]
    pub product_info_url: String,
}

/// Snapshot of one catalog entry as seen by the monograph engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub din: ProductIdentifier,
    pub drug_code: Option<SourceCode>,
    #[serde(rename = "referenceUrl")]
    pub reference_url: Option<String>,
    #[serde(rename = "revisionDate")]
    pub revision_date: Option<String>,
    pub validators: CacheValidators,
    #[serde(rename = "checkedAt")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    /// Entries without a known monograph go through discovery
    #[must_use]
    pub fn needs_discovery(&self) -> bool {
        self.reference_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    }
}
