//! Infrastructure layer for database connections, parsing, and external integrations
//!
//! HTTP access to the source site, the SQLite catalog store, extract table
//! reading, markup heuristics, configuration and logging.

pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod dpd_extract;
pub mod http_client;
pub mod logging;
pub mod page_fetcher;
pub mod parsing;
pub mod parsing_error;
pub mod revalidator;

// Re-export commonly used items
pub use catalog_repository::SqliteCatalogRepository;
pub use config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use dpd_extract::{ConfiguredExtractSource, ExtractSource, ExtractTable};
pub use http_client::{FetchError, HttpClientConfig, MonographHttpClient};
pub use logging::init_logging_with_config;
pub use page_fetcher::{HttpPageFetcher, MonographPageFetcher, PageResponse};
pub use parsing::{MonographPageParser, MonographParsingConfig, ParsingError, ParsingResult};
pub use revalidator::{DocumentRevalidator, HttpRevalidator};
