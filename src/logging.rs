//! Logging setup
//!
//! Logs go to stderr (stdout belongs to the stdio transport) and to a rolling
//! log file. Records at ERROR level are also copied to `errors.log` next to
//! the main file. `RUST_LOG`, when set, overrides `LOG_LEVEL`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter, Layer};

use crate::error::{JokesMcpError, Result};

/// Default log file path
pub const DEFAULT_LOG_FILE: &str = "logs/mcp_server.log";

/// Name of the error-only log written beside the main file
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Minimum severity written to the logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// `tracing` has no level above ERROR, so CRITICAL maps onto it
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!(
                "invalid log level: {}. Valid levels are: [\"DEBUG\", \"INFO\", \"WARNING\", \"ERROR\", \"CRITICAL\"]",
                other
            )),
        }
    }
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogRotation::Minutely => "minutely",
            LogRotation::Hourly => "hourly",
            LogRotation::Daily => "daily",
            LogRotation::Never => "never",
        }
    }

    /// Length of one rotation period, `None` when the file never rolls
    pub fn period(&self) -> Option<Duration> {
        match self {
            LogRotation::Minutely => Some(Duration::from_secs(60)),
            LogRotation::Hourly => Some(Duration::from_secs(3600)),
            LogRotation::Daily => Some(Duration::from_secs(86_400)),
            LogRotation::Never => None,
        }
    }

    fn rotation(&self) -> Rotation {
        match self {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minutely" | "1 minute" => Ok(LogRotation::Minutely),
            "hourly" | "1 hour" => Ok(LogRotation::Hourly),
            "daily" | "1 day" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            other => Err(format!(
                "invalid log rotation: {}. Valid rotations are: [\"minutely\", \"hourly\", \"daily\", \"never\"]",
                other
            )),
        }
    }
}

/// How long rotated log files are kept, written as `"<N> <unit>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRetention(Duration);

impl LogRetention {
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Rotated files to keep so that `rotation` covers this retention
    pub fn max_files(&self, rotation: LogRotation) -> Option<usize> {
        let period = rotation.period()?.as_secs();
        let files = self.0.as_secs().div_ceil(period);
        Some(files.max(1) as usize)
    }
}

impl fmt::Display for LogRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

impl FromStr for LogRetention {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || {
            format!(
                "invalid log retention: {:?}. Expected \"<N> minutes|hours|days|weeks\"",
                s
            )
        };

        let mut parts = s.split_whitespace();
        let (Some(count), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let count: u64 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        let unit_secs = match unit.to_lowercase().trim_end_matches('s') {
            "minute" => 60,
            "hour" => 3600,
            "day" => 86_400,
            "week" => 604_800,
            _ => return Err(invalid()),
        };

        Ok(Self(Duration::from_secs(count * unit_secs)))
    }
}

/// Logging settings loaded with the rest of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub file: PathBuf,
    pub rotation: LogRotation,
    pub retention: LogRetention,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: PathBuf::from(DEFAULT_LOG_FILE),
            rotation: LogRotation::Daily,
            retention: LogRetention::from_duration(Duration::from_secs(7 * 86_400)),
        }
    }
}

/// Keeps the background log writers flushing; drop on exit
#[must_use]
pub struct LogGuards {
    _file: WorkerGuard,
    _errors: WorkerGuard,
}

/// Build a rolling appender writing `file_name` inside `directory`
fn rolling_appender(
    settings: &LogSettings,
    directory: &Path,
    file_name: &str,
) -> Result<RollingFileAppender> {
    let path = Path::new(file_name);
    let prefix = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);

    let mut builder = RollingFileAppender::builder()
        .rotation(settings.rotation.rotation())
        .filename_prefix(prefix);
    if let Some(suffix) = path.extension().and_then(|ext| ext.to_str()) {
        builder = builder.filename_suffix(suffix);
    }
    if let Some(max_files) = settings.retention.max_files(settings.rotation) {
        builder = builder.max_log_files(max_files);
    }

    builder.build(directory).map_err(|e| {
        JokesMcpError::Logging(format!(
            "cannot open log file {} in {}: {}",
            file_name,
            directory.display(),
            e
        ))
    })
}

/// Install the global subscriber
///
/// Keep the returned guards alive for as long as the process logs.
pub fn init(settings: &LogSettings) -> Result<LogGuards> {
    let directory = settings
        .file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = settings
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            JokesMcpError::Logging(format!("invalid log file path: {}", settings.file.display()))
        })?;

    std::fs::create_dir_all(directory)?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(rolling_appender(settings, directory, file_name)?);
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling_appender(settings, directory, ERROR_LOG_FILE)?);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(settings.level.level_filter().into()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer::layer().with_writer(std::io::stderr))
        .with(fmt_layer::layer().with_writer(file_writer).with_ansi(false))
        .with(
            fmt_layer::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .map_err(|e| JokesMcpError::Logging(e.to_string()))?;

    tracing::debug!(
        "Logging to {} (level={}, rotation={}, retention={})",
        settings.file.display(),
        settings.level,
        settings.rotation,
        settings.retention
    );

    Ok(LogGuards {
        _file: file_guard,
        _errors: error_guard,
    })
}
