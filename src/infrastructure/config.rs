//! Configuration infrastructure
//!
//! Layered loading with the `config` crate, lowest precedence first:
//! 1. compiled defaults (`AppConfig::default()`)
//! 2. optional file (`monograph-sync.toml` or an explicit path)
//! 3. environment variables (`MONOGRAPH_SYNC__SECTION__KEY`)

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::infrastructure::parsing::MonographParsingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Could not resolve platform data directory")]
    DataDirUnavailable,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub discovery: DiscoveryConfig,
    pub revalidation: RevalidationConfig,
    pub extractor: MonographParsingConfig,
    pub database: DatabaseConfig,
    pub extract: ExtractConfig,
    pub logging: LoggingConfig,
}

/// Outbound HTTP policy shared by page fetches and conditional checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Fixed identifying client signature
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub head_timeout_secs: u64,
    /// Redirect hop cap; loops end here instead of hanging
    pub max_redirects: usize,
    /// Politeness quota on top of the concurrency cap (0 disables)
    pub max_requests_per_second: u32,
}

/// Discovery fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Source site base, without trailing slash
    pub base_url: String,
    /// Simultaneous in-flight page fetches
    pub concurrency: usize,
    /// Optional cap on identifiers per run
    pub batch_limit: Option<usize>,
}

/// Revalidation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidationConfig {
    /// 1 keeps the loop sequential
    pub concurrency: usize,
    /// Re-run discovery for documents that answered 200
    pub rediscover_on_change: bool,
    pub batch_limit: Option<usize>,
}

/// Catalog store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite:` URL; defaults to a file under the platform data dir
    pub url: Option<String>,
    pub max_connections: u32,
}

/// DPD extract table sources (URL or local path) and filter rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub drug: Option<String>,
    pub form: Option<String>,
    pub route: Option<String>,
    pub ingred: Option<String>,
    pub comp: Option<String>,
    pub schedule: Option<String>,
    pub download_timeout_secs: u64,
    pub category_keyword: String,
    pub route_keyword: String,
    /// Regex matched case-insensitively against the dosage form
    pub dosage_form_pattern: String,
    pub product_info_base: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// Enable JSON formatted file logs
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `<data dir>/logs`
    pub log_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            page_timeout_secs: defaults::PAGE_TIMEOUT_SECONDS,
            head_timeout_secs: defaults::HEAD_TIMEOUT_SECONDS,
            max_redirects: defaults::MAX_REDIRECTS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: dpd::BASE_URL.to_string(),
            concurrency: defaults::DISCOVERY_CONCURRENCY,
            batch_limit: None,
        }
    }
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::REVALIDATION_CONCURRENCY,
            rediscover_on_change: false,
            batch_limit: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            drug: None,
            form: None,
            route: None,
            ingred: None,
            comp: None,
            schedule: None,
            download_timeout_secs: defaults::DOWNLOAD_TIMEOUT_SECONDS,
            category_keyword: "human".to_string(),
            route_keyword: "oral".to_string(),
            dosage_form_pattern: "tablet|capsule|softgel".to_string(),
            product_info_base: dpd::BASE_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default())?;

        let file_source = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        if let Some(p) = path {
            info!("Loaded configuration from: {:?}", p);
        }
        Ok(config)
    }

    /// Reject values that would stall or misconfigure a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.discovery.concurrency == 0, "discovery.concurrency must be greater than 0"),
            (self.revalidation.concurrency == 0, "revalidation.concurrency must be greater than 0"),
            (self.http.page_timeout_secs == 0, "http.page_timeout_secs must be greater than 0"),
            (self.http.head_timeout_secs == 0, "http.head_timeout_secs must be greater than 0"),
            (self.http.user_agent.trim().is_empty(), "http.user_agent must not be empty"),
            (self.database.max_connections == 0, "database.max_connections must be greater than 0"),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(ConfigError::Validation {
                message: (*message).to_string(),
            });
        }

        self.extractor
            .validate()
            .map_err(|e| ConfigError::Validation { message: e.to_string() })
    }

    /// Application data directory (database, logs)
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or(ConfigError::DataDirUnavailable)
    }

    /// Configured database URL or the default file under the data dir
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }
        let path = Self::data_dir()?.join("database").join("catalog.db");
        Ok(format!("sqlite:{}", path.display()))
    }

    /// Configured log dir or `<data dir>/logs`
    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.logging.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("logs")),
        }
    }
}

pub const DEFAULT_CONFIG_FILE: &str = "monograph-sync";
pub const ENV_PREFIX: &str = "MONOGRAPH_SYNC";
pub const APP_DIR_NAME: &str = "monograph-sync";

/// Drug Product Database (Health Canada) endpoints
pub mod dpd {
    /// Source site base path
    pub const BASE_URL: &str = "https://health-products.canada.ca/dpd-bdpp";

    /// Authority that earns the canonical-domain bonus
    pub const CANONICAL_DOMAIN: &str = "health-products.canada.ca";

    /// Product monograph index page, relative to the base
    pub const MONOGRAPH_PAGE_PATH: &str = "pm-mp.do";

    /// Product information page, relative to the base
    pub const PRODUCT_INFO_PATH: &str = "info";
}

/// Default values
pub mod defaults {
    pub const USER_AGENT: &str = "PillScanUpdater/1.0 (+ops@pillscan.ca)";

    pub const PAGE_TIMEOUT_SECONDS: u64 = 20;

    pub const HEAD_TIMEOUT_SECONDS: u64 = 12;

    pub const MAX_REDIRECTS: usize = 10;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    /// Politeness cap for the source site
    pub const DISCOVERY_CONCURRENCY: usize = 10;

    pub const REVALIDATION_CONCURRENCY: usize = 1;

    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const DOWNLOAD_TIMEOUT_SECONDS: u64 = 120;
}
