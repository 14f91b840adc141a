//! monograph-sync command line
//!
//! Usage:
//!   monograph-sync ingest                  # load the DPD extract into the catalog
//!   monograph-sync discover --limit 500    # find monographs for entries without one
//!   monograph-sync revalidate              # conditional checks for known monographs
//!   monograph-sync sync                    # discover, then revalidate

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use monograph_sync_lib::application::{IngestionService, MonographSyncService};
use monograph_sync_lib::domain::CatalogStore;
use monograph_sync_lib::infrastructure::{
    AppConfig, ConfiguredExtractSource, DatabaseConnection, HttpPageFetcher, HttpRevalidator, MonographHttpClient,
    MonographPageParser, SqliteCatalogRepository, init_logging_with_config,
};

#[derive(Parser)]
#[command(name = "monograph-sync")]
#[command(version, about = "Drug catalog ingestion with monograph discovery and revalidation")]
struct Cli {
    /// Configuration file (defaults to ./monograph-sync.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Cap on identifiers processed by this run
    #[arg(short = 'l', long, global = true)]
    limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Load the DPD extract tables and upsert catalog products
    Ingest,
    /// Discover monograph links for entries that have none
    Discover,
    /// Revalidate known monograph links with conditional requests
    Revalidate,
    /// Discover, then revalidate
    Sync,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let log_dir = config.log_dir().ok();
    if let Err(e) = init_logging_with_config(&config.logging, log_dir.as_deref()) {
        eprintln!("Error initializing logging: {e:#}");
        return std::process::ExitCode::FAILURE;
    }

    match run(cli.command, cli.limit, &config).await {
        Ok(report) => {
            println!("{report}");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ Run failed: {:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand and returns its summary as pretty JSON
async fn run(command: Command, limit: Option<usize>, config: &AppConfig) -> Result<String> {
    let database_url = config.database_url()?;
    let db = DatabaseConnection::new(&database_url, config.database.max_connections).await?;
    db.migrate().await.context("Failed to migrate catalog database")?;
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogRepository::new(db.pool().clone()));

    let client = MonographHttpClient::from_http_config(&config.http)?;

    let summary = match command {
        Command::Ingest => {
            let source = Arc::new(ConfiguredExtractSource::new(client, config.extract.clone()));
            let summary = IngestionService::new(source, store, &config.extract)?.ingest().await?;
            info!("✅ Ingested {} products from {} drug rows", summary.products, summary.drug_rows);
            return Ok(serde_json::to_string_pretty(&summary)?);
        }
        Command::Discover => sync_service(config, store, client)?.discover_missing(limit).await?,
        Command::Revalidate => sync_service(config, store, client)?.revalidate_known(limit).await?,
        Command::Sync => sync_service(config, store, client)?.sync(limit).await?,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn sync_service(
    config: &AppConfig,
    store: Arc<dyn CatalogStore>,
    client: MonographHttpClient,
) -> Result<MonographSyncService> {
    let parser = MonographPageParser::with_config(config.extractor.clone()).context("Invalid extractor configuration")?;
    Ok(MonographSyncService::new(
        store,
        Arc::new(HttpPageFetcher::new(client.clone(), config.discovery.base_url.clone())),
        Arc::new(HttpRevalidator::new(client)),
        Arc::new(parser),
        config.discovery.clone(),
        config.revalidation.clone(),
    ))
}
