//! Configuration management for the Jokes MCP Server
//!
//! Settings come from environment variables (optionally seeded from a `.env`
//! file) and are loaded once at startup.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, JokesMcpError, Result};
use crate::logging::{LogLevel, LogRetention, LogRotation, LogSettings, DEFAULT_LOG_FILE};
use crate::repository::RepositoryKind;
use crate::transport::Transport;

/// Environment variable names
pub mod env {
    pub const API_BASE_URL: &str = "API_BASE_URL";
    pub const MCP_SERVER_HOST: &str = "MCP_SERVER_HOST";
    pub const MCP_SERVER_PORT: &str = "MCP_SERVER_PORT";
    pub const PROTOCOL_MCP: &str = "PROTOCOL_MCP";
    pub const LOCAL_TOKEN: &str = "LOCAL_TOKEN";
    pub const REPOSITORY_TYPE: &str = "REPOSITORY_TYPE";
    pub const CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
    pub const CACHE_SWEEP_INTERVAL_SECS: &str = "CACHE_SWEEP_INTERVAL_SECS";
    pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FILE: &str = "LOG_FILE";
    pub const LOG_ROTATION: &str = "LOG_ROTATION";
    pub const LOG_RETENTION: &str = "LOG_RETENTION";
}

/// Configuration for the Jokes MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the joke API, without trailing slash
    pub api_base_url: String,

    /// Bind host for network transports
    pub host: String,

    /// Bind port for network transports
    pub port: u16,

    /// Transport used to expose the tools
    pub transport: Transport,

    /// Shared secret for Bearer authentication on network transports
    pub local_token: Option<String>,

    /// Which repository implementation backs the tools
    pub repository_kind: RepositoryKind,

    /// Lifetime of cached jokes
    pub cache_ttl: Duration,

    /// Interval between expired-entry sweeps
    pub cache_sweep_interval: Duration,

    /// Timeout applied to every joke API request
    pub request_timeout: Duration,

    /// Log level and log file settings
    pub logging: LogSettings,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup(env::API_BASE_URL).ok_or_else(|| {
            JokesMcpError::Config(ConfigError::MissingEnvVar {
                var: env::API_BASE_URL.to_string(),
            })
        })?;
        let api_base_url = validate_api_url(&api_base_url)?;

        let host = lookup(env::MCP_SERVER_HOST).unwrap_or_else(|| "0.0.0.0".to_string());

        let port: u16 = parse_var(&lookup, env::MCP_SERVER_PORT, 8000)?;
        if port == 0 {
            return Err(invalid(env::MCP_SERVER_PORT, "port must be between 1 and 65535"));
        }

        let transport: Transport = parse_var(&lookup, env::PROTOCOL_MCP, Transport::Stdio)?;
        let repository_kind: RepositoryKind =
            parse_var(&lookup, env::REPOSITORY_TYPE, RepositoryKind::Cached)?;

        let local_token = lookup(env::LOCAL_TOKEN).filter(|t| !t.trim().is_empty());

        let cache_ttl_secs: u64 = parse_var(&lookup, env::CACHE_TTL_SECS, 300)?;
        if cache_ttl_secs == 0 {
            return Err(invalid(env::CACHE_TTL_SECS, "TTL must be positive"));
        }

        let sweep_secs: u64 = parse_var(&lookup, env::CACHE_SWEEP_INTERVAL_SECS, 300)?;
        if !(60..=3600).contains(&sweep_secs) {
            return Err(invalid(
                env::CACHE_SWEEP_INTERVAL_SECS,
                "interval must be between 60 and 3600 seconds",
            ));
        }

        let timeout_secs: u64 = parse_var(
            &lookup,
            env::REQUEST_TIMEOUT_SECS,
            joke_api::DEFAULT_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(invalid(env::REQUEST_TIMEOUT_SECS, "timeout must be positive"));
        }

        let logging = load_log_settings(&lookup)?;

        Ok(Self {
            api_base_url,
            host,
            port,
            transport,
            local_token,
            repository_kind,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_sweep_interval: Duration::from_secs(sweep_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            logging,
        })
    }

    /// Check cross-field constraints once CLI overrides have been applied
    pub fn validate(&self) -> Result<()> {
        if self.transport.is_network() && self.local_token.is_none() {
            return Err(JokesMcpError::Config(ConfigError::MissingEnvVar {
                var: env::LOCAL_TOKEN.to_string(),
            }));
        }
        Ok(())
    }

    /// `host:port` for network transports
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// One-line summary safe for logs
    pub fn redacted(&self) -> String {
        format!(
            "Config(api_base_url={:?}, host={:?}, port={}, transport={}, repository={}, \
             cache_ttl={}s, log_level={}, log_file={:?}, local_token={})",
            self.api_base_url,
            self.host,
            self.port,
            self.transport,
            self.repository_kind,
            self.cache_ttl.as_secs(),
            self.logging.level,
            self.logging.file,
            if self.local_token.is_some() { "***" } else { "<unset>" },
        )
    }
}

fn validate_api_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(invalid(env::API_BASE_URL, "cannot be empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid(env::API_BASE_URL, "must start with http:// or https://"));
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn load_log_settings<F>(lookup: &F) -> Result<LogSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = LogSettings::default();

    let level: LogLevel = parse_var(lookup, env::LOG_LEVEL, defaults.level)?;
    let rotation: LogRotation = parse_var(lookup, env::LOG_ROTATION, defaults.rotation)?;
    let retention: LogRetention = parse_var(lookup, env::LOG_RETENTION, defaults.retention)?;

    let file = match lookup(env::LOG_FILE) {
        None => PathBuf::from(DEFAULT_LOG_FILE),
        Some(raw) if raw.trim().is_empty() => {
            return Err(invalid(env::LOG_FILE, "cannot be empty"));
        }
        Some(raw) => PathBuf::from(raw.trim()),
    };
    if file.file_name().is_none() {
        return Err(invalid(env::LOG_FILE, "must name a file"));
    }

    Ok(LogSettings {
        level,
        file,
        rotation,
        retention,
    })
}

fn parse_var<T, F>(lookup: &F, var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, e.to_string())),
        _ => Ok(default),
    }
}

fn invalid(var: &str, message: impl Into<String>) -> JokesMcpError {
    JokesMcpError::Config(ConfigError::InvalidValue {
        var: var.to_string(),
        message: message.into(),
    })
}

/// Joke API constants
pub mod joke_api {
    /// Default request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub const RANDOM_JOKE_PATH: &str = "/random_joke";
    pub const RANDOM_TEN_PATH: &str = "/random_ten";
}
