//! # Logging Utilities
//!
//! Logging setup for symdex using `tracing`.
//!
//! Console output goes to stderr so that command output on stdout stays
//! clean enough to pipe. Optionally the same events are written to a file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use symdex_utils::{init_logging, LogSettings};
//!
//! let _guard = init_logging(&LogSettings::from_env()).expect("Failed to initialize logging");
//!
//! tracing::info!("index loaded");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter used when no explicit level is given (e.g. `RUST_LOG=symdex_core=debug`)
//! - `SYMDEX_LOG_FORMAT`: `pretty` (default) or `json`
//! - `SYMDEX_LOG_FILE`: path of a daily-rolling log file, or `auto` for
//!   `~/.symdex/YYYY-MM-DD-symdex.log`

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Where and how to log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings
{
    /// Explicit level; overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    /// Output format
    pub format: LogFormat,
    /// Optional log file (rolled daily)
    pub file: Option<PathBuf>,
}

impl LogSettings
{
    /// Settings from `SYMDEX_LOG_FORMAT` and `SYMDEX_LOG_FILE`
    ///
    /// Unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self
    {
        let format = env::var("SYMDEX_LOG_FORMAT")
            .ok()
            .and_then(|s| LogFormat::from_str(&s).ok())
            .unwrap_or_default();
        let file = env::var("SYMDEX_LOG_FILE")
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| {
                if value == "auto" {
                    default_log_file()
                } else {
                    PathBuf::from(value)
                }
            });
        Self {
            level: None,
            format,
            file,
        }
    }

    /// Use `level` regardless of `RUST_LOG`
    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        if level.is_some() {
            self.level = level;
        }
        self
    }

    /// Use `format`
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self
    {
        self.format = format;
        self
    }

    fn filter(&self) -> EnvFilter
    {
        // Priority: explicit level, then RUST_LOG, then warnings only.
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        match env::var("RUST_LOG") {
            Ok(rust_log) => EnvFilter::try_new(&rust_log).unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string())),
            Err(_) => EnvFilter::new(Level::WARN.to_string()),
        }
    }
}

/// `~/.symdex/YYYY-MM-DD-symdex.log`, or the same name under the temp dir without a home
#[must_use]
pub fn default_log_file() -> PathBuf
{
    let today = Utc::now().format("%Y-%m-%d");
    let dir = env::var("HOME").map_or_else(|_| env::temp_dir(), |home| PathBuf::from(home).join(".symdex"));
    dir.join(format!("{today}-symdex.log"))
}

/// Keeps the background file writer alive; drop it last
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize the global subscriber
///
/// ## Example
///
/// ```rust,no_run
/// use symdex_utils::{init_logging, LogFormat, LogLevel, LogSettings};
///
/// let settings = LogSettings::default()
///     .with_level(Some(LogLevel::Debug))
///     .with_format(LogFormat::Json);
/// let _guard = init_logging(&settings).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - The log file's directory cannot be created
pub fn init_logging(settings: &LogSettings) -> Result<LoggingGuard, LoggingError>
{
    let filter = settings.filter();
    let (file_writer, guard) = match &settings.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let result = match settings.format {
        LogFormat::Pretty => {
            let console = fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_writer(io::stderr)
                .with_filter(filter.clone());
            let file = file_writer.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(filter)
            });
            Registry::default().with(console).with(file).try_init()
        }
        LogFormat::Json => {
            let console = fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stderr)
                .with_filter(filter.clone());
            let file = file_writer.map(|writer| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(filter)
            });
            Registry::default().with(console).with(file).try_init()
        }
    };
    result.map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError>
{
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.display().to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// The log file path has no file name
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("dev").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("PROD").unwrap(), LogFormat::Json);
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_explicit_level_is_kept_over_none()
    {
        let settings = LogSettings::default().with_level(Some(LogLevel::Debug)).with_level(None);
        assert_eq!(settings.level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_split_log_path()
    {
        let (dir, name) = split_log_path(Path::new("logs/symdex.log")).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, PathBuf::from("symdex.log"));

        let (dir, _) = split_log_path(Path::new("symdex.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_default_log_file_is_dated()
    {
        let path = default_log_file();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-symdex.log"));
        assert_eq!(name.len(), "YYYY-MM-DD-symdex.log".len());
    }
}
