//! Repository interfaces for the product catalog

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::monograph::MonographUpdate;
use crate::domain::product::{CatalogEntry, CatalogProduct};

/// Durable catalog keyed by DIN. Writes are idempotent per batch.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Product columns only; monograph columns are never touched
    async fn upsert_products(&self, products: &[CatalogProduct]) -> Result<u64>;

    /// Field-level monograph patches, applied in one transaction
    async fn apply_monograph_updates(&self, updates: &[MonographUpdate]) -> Result<u64>;

    async fn load_snapshot(&self) -> Result<Vec<CatalogEntry>>;

    async fn count_products(&self) -> Result<u64>;
}
