//! Monograph Sync - drug product catalog with monograph link tracking
//!
//! Builds an oral solid-dose product catalog from the Health Canada DPD
//! extract, discovers each product's monograph PDF from its index page, and
//! keeps the link fresh with conditional HEAD requests.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{IngestionService, MonographSyncService};
pub use domain::{CatalogEntry, CatalogProduct, DiscoveryOutcome, DiscoveryResult, RevalidationOutcome, RunSummary};
pub use infrastructure::AppConfig;
