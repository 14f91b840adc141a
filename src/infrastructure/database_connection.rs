// Database connection and pool management
// SQLite catalog store over sqlx

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        let in_memory = db_path.starts_with(":memory:");
        if !in_memory {
            if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        // An in-memory database exists per connection
        let max_connections = if in_memory { 1 } else { max_connections };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open catalog database {database_url}"))?;

        info!("Catalog database opened: {}", database_url);
        Ok(Self { pool })
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_pills_sql = r"
            CREATE TABLE IF NOT EXISTS pills (
                din TEXT PRIMARY KEY,
                drug_code TEXT NOT NULL DEFAULT '',
                brand_name TEXT NOT NULL DEFAULT '',
                dosage_form TEXT NOT NULL DEFAULT '',
                route TEXT NOT NULL DEFAULT '',
                strength TEXT NOT NULL DEFAULT '',
                active_ingredient TEXT NOT NULL DEFAULT '',
                manufacturer TEXT NOT NULL DEFAULT '',
                schedule TEXT NOT NULL DEFAULT '',
                class TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT '',
                product_info_url TEXT NOT NULL DEFAULT '',
                monograph_url TEXT,
                monograph_revision_date TEXT,
                monograph_etag TEXT,
                monograph_last_modified TEXT,
                monograph_checked_at TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        ";

        let create_indexes_sql = r"
            CREATE INDEX IF NOT EXISTS idx_pills_drug_code ON pills (drug_code);
            CREATE INDEX IF NOT EXISTS idx_pills_monograph_url ON pills (monograph_url);
        ";

        sqlx::query(create_pills_sql).execute(&self.pool).await?;
        sqlx::raw_sql(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}
