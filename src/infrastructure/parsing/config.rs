//! Parsing configuration for monograph index pages
//!
//! Centralized, table-driven rules: candidate scoring weights, language
//! tokens, revision-date labels and date formats. New locales or labels
//! are added here, not in the extractor.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::dpd;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// Main parsing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonographParsingConfig {
    /// Directory used for relative links when the page URL is unknown
    pub base_url: String,

    /// Reference document extension, without the dot
    pub document_extension: String,

    /// Candidate scoring
    pub scoring: CandidateScoring,

    /// Label phrases searched in priority order
    pub revision_labels: Vec<String>,

    /// chrono formats tried in order against the labeled value
    pub date_formats: Vec<String>,

    /// Plausible range for the bare-year fallback
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for MonographParsingConfig {
    fn default() -> Self {
        Self {
            base_url: dpd::BASE_URL.to_string(),
            document_extension: "pdf".to_string(),
            scoring: CandidateScoring::default(),
            revision_labels: vec![
                "Revision Date".to_string(),
                "Date".to_string(),
                "Last updated".to_string(),
                "Dernière mise".to_string(),
            ],
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%d-%b-%Y".to_string(),
                "%d-%B-%Y".to_string(),
                "%Y/%m/%d".to_string(),
                "%d/%m/%Y".to_string(),
            ],
            min_year: 1900,
            max_year: 2099,
        }
    }
}

impl MonographParsingConfig {
    pub fn validate(&self) -> ParsingResult<()> {
        if self.document_extension.trim().is_empty() {
            return Err(ParsingError::configuration(
                "document_extension",
                "document extension must not be empty",
            ));
        }
        if self.revision_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ParsingError::configuration(
                "revision_labels",
                "at least one revision label is required",
            ));
        }
        if self.date_formats.is_empty() {
            return Err(ParsingError::configuration(
                "date_formats",
                "at least one date format is required",
            ));
        }
        if self.min_year > self.max_year {
            return Err(ParsingError::configuration(
                "min_year",
                format!("min_year {} is after max_year {}", self.min_year, self.max_year),
            ));
        }
        Ok(())
    }
}

/// Weights for ranking reference document candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateScoring {
    pub preferred_language_token: String,
    pub preferred_language_weight: i32,
    pub alternate_language_token: String,
    pub alternate_language_weight: i32,
    pub canonical_domain: String,
    pub canonical_domain_weight: i32,
}

impl Default for CandidateScoring {
    fn default() -> Self {
        Self {
            preferred_language_token: "eng".to_string(),
            preferred_language_weight: 2,
            alternate_language_token: "fra".to_string(),
            alternate_language_weight: -2,
            canonical_domain: dpd::CANONICAL_DOMAIN.to_string(),
            canonical_domain_weight: 1,
        }
    }
}
