//! Logging system configuration and initialization
//!
//! - Console output and optional daily-rolled file output
//! - Structured JSON file logging (optional)
//! - `RUST_LOG` overrides the configured level
//! - UTC timestamps

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "monograph-sync.log";

// Keeps the non-blocking file writer alive for the whole process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// RFC 3339 UTC timestamps with millisecond precision
struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Build the filter: `RUST_LOG` if set, otherwise the configured level with
/// HTTP and database internals pinned to `warn` unless tracing.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?;

    // Only a bare level gets the dependency pins; directive lists are taken as-is
    let bare_level = !level.contains(',') && !level.contains('=');
    if bare_level && !level.eq_ignore_ascii_case("trace") {
        for directive in [
            "sqlx=warn",
            "reqwest=warn",
            "hyper=warn",
            "hyper_util=warn",
            "h2=warn",
            "rustls=warn",
        ] {
            filter = filter.add_directive(directive.parse().with_context(|| format!("Invalid directive: {}", directive))?);
        }
        let own = format!("monograph_sync_lib={}", level);
        filter = filter.add_directive(own.parse().with_context(|| format!("Invalid directive: {}", own))?);
    }

    Ok(filter)
}

/// Initialize logging; `log_dir` is only used when file output is enabled
pub fn init_logging_with_config(config: &LoggingConfig, log_dir: Option<&Path>) -> Result<()> {
    let env_filter = build_env_filter(&config.level)?;

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(UtcTimeFormatter)
            .with_target(false)
            .boxed()
    });

    let file_layer = match (config.file_output, log_dir) {
        (true, Some(dir)) => {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;

            let (file_writer, file_guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow::anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            let layer = if config.json_format {
                fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(UtcTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .boxed()
            } else {
                fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(UtcTimeFormatter)
                    .with_target(false)
                    .with_ansi(false)
                    .boxed()
            };
            Some(layer)
        }
        _ => None,
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Logging already initialized")?;

    if let (true, Some(dir)) = (config.file_output, log_dir) {
        info!("File logging enabled: {}", dir.display());
    }
    Ok(())
}
