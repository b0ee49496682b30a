//! Logging bootstrap for VME bridge hosts
//!
//! Console output uses a bracketed level format, an optional daily-rolling
//! file layer goes through a non-blocking appender, and the filter can be
//! swapped at runtime.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809000Z [INFO] opened V2718 over usb:0`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the file appender worker alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Name used for the default filter directive and the log file prefix
    pub service_name: String,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
    /// Write a daily-rolling file next to the console output
    pub enable_file: bool,
    /// JSON lines in the file layer
    pub enable_json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "vme_bridge".to_string(),
            log_dir: PathBuf::from("logs"),
            level: "info".to_string(),
            enable_file: false,
            enable_json: false,
        }
    }
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_filter(&self) -> String {
        let level: Level = self.level.parse().unwrap_or(Level::INFO);
        format!(
            "{},{}=debug",
            level.as_str().to_lowercase(),
            self.service_name.replace('-', "_")
        )
    }
}

/// Initialize the global subscriber
pub fn init_with_config(config: &LogConfig) -> Result<()> {
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| config.default_filter());
    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", filter_str, e)))?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);
    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let current = CURRENT_LOG_LEVEL.get_or_init(|| Mutex::new(String::new()));
    if let Ok(mut slot) = current.lock() {
        *slot = filter_str;
    }

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender =
            tracing_appender::rolling::daily(&config.log_dir, format!("{}.log", config.service_name));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_level(true)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!("Logging: {} @ {:?}", config.service_name, config.log_dir);
    Ok(())
}

/// Console-only init at the given level
pub fn init(level: &str) -> Result<()> {
    let config = LogConfig {
        level: level.to_string(),
        ..Default::default()
    };
    init_with_config(&config)
}

/// Dynamically set log filter level at runtime
///
/// Accepts a plain level (`"debug"`) or a full filter spec
/// (`"info,vme_bridge=trace"`).
pub fn set_log_level(level: &str) -> Result<()> {
    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or_else(|| Error::Config("logging not initialized".to_string()))?;

    let new_filter = EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", level, e)))?;

    handle
        .reload(new_filter)
        .map_err(|e| Error::Config(format!("failed to reload log filter: {}", e)))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Current log filter string
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}
