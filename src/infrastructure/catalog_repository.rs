//! SQLite catalog store
//!
//! Product columns come from the extract; monograph columns are patched
//! field by field from discovery and revalidation updates. A URL and its
//! validators are always written by the same statement.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::monograph::{CacheValidators, MonographChange, MonographUpdate};
use crate::domain::product::{CatalogEntry, CatalogProduct};
use crate::domain::repositories::CatalogStore;
use crate::domain::value_objects::{ProductIdentifier, SourceCode};

/// ISO-8601 UTC with second precision
fn format_checked_at(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogRepository {
    async fn upsert_products(&self, products: &[CatalogProduct]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for product in products {
            let result = sqlx::query(
                r"
                INSERT INTO pills
                (din, drug_code, brand_name, dosage_form, route, strength, active_ingredient,
                 manufacturer, schedule, class, status, product_info_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(din) DO UPDATE SET
                    drug_code = excluded.drug_code,
                    brand_name = excluded.brand_name,
                    dosage_form = excluded.dosage_form,
                    route = excluded.route,
                    strength = excluded.strength,
                    active_ingredient = excluded.active_ingredient,
                    manufacturer = excluded.manufacturer,
                    schedule = excluded.schedule,
                    class = excluded.class,
                    status = excluded.status,
                    product_info_url = excluded.product_info_url,
                    updated_at = CURRENT_TIMESTAMP
                ",
            )
            .bind(product.din.as_str())
            .bind(&product.drug_code)
            .bind(&product.brand_name)
            .bind(&product.dosage_form)
            .bind(&product.route)
            .bind(&product.strength)
            .bind(&product.active_ingredient)
            .bind(&product.manufacturer)
            .bind(&product.schedule)
            .bind(&product.class)
            .bind(&product.status)
            .bind(&product.product_info_url)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert product {}", product.din))?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Upserted {} catalog products", written);
        Ok(written)
    }

    async fn apply_monograph_updates(&self, updates: &[MonographUpdate]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for update in updates {
            let checked_at = format_checked_at(&update.checked_at);
            let query = match &update.change {
                MonographChange::CheckedOnly => sqlx::query(
                    "UPDATE pills SET monograph_checked_at = ?, updated_at = CURRENT_TIMESTAMP WHERE din = ?",
                )
                .bind(checked_at),
                MonographChange::Discovered {
                    reference_url,
                    revision_date,
                } => sqlx::query(
                    r"
                    UPDATE pills SET
                        monograph_url = ?,
                        monograph_revision_date = ?,
                        monograph_etag = NULL,
                        monograph_last_modified = NULL,
                        monograph_checked_at = ?,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE din = ?
                    ",
                )
                .bind(reference_url.clone())
                .bind(revision_date.clone())
                .bind(checked_at),
                MonographChange::Refreshed {
                    validators,
                    revision_date,
                } => sqlx::query(
                    r"
                    UPDATE pills SET
                        monograph_etag = ?,
                        monograph_last_modified = ?,
                        monograph_revision_date = COALESCE(?, monograph_revision_date),
                        monograph_checked_at = ?,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE din = ?
                    ",
                )
                .bind(validators.etag.clone())
                .bind(validators.last_modified.clone())
                .bind(revision_date.clone())
                .bind(checked_at),
            };

            let result = query
                .bind(update.din.as_str())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to apply monograph update for {}", update.din))?;
            if result.rows_affected() == 0 {
                warn!("Monograph update for unknown DIN {} ignored", update.din);
            }
            written += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Applied {} monograph updates", written);
        Ok(written)
    }

    async fn load_snapshot(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query(
            r"
            SELECT din, drug_code, monograph_url, monograph_revision_date,
                   monograph_etag, monograph_last_modified, monograph_checked_at
            FROM pills
            ORDER BY din
            ",
        )
        .fetch_all(&*self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let din: String = row.try_get("din")?;
            let drug_code: String = row.try_get("drug_code")?;
            let checked_at: Option<String> = row.try_get("monograph_checked_at")?;
            let checked_at = checked_at.and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!("Unparseable checked_at {:?} for {}: {}", raw, din, e);
                    None
                }
            });

            entries.push(CatalogEntry {
                din: ProductIdentifier::new(din),
                drug_code: SourceCode::parse(&drug_code),
                reference_url: row.try_get("monograph_url")?,
                revision_date: row.try_get("monograph_revision_date")?,
                validators: CacheValidators::new(
                    row.try_get("monograph_etag")?,
                    row.try_get("monograph_last_modified")?,
                ),
                checked_at,
            });
        }
        Ok(entries)
    }

    async fn count_products(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pills")
            .fetch_one(&*self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
