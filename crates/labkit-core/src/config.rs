//! Configuration management for labkit.
//!
//! Connection parameters live in a TOML file under a `[gitlab]` table.
//! Config files are stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/labkit/config.toml`
//! - **Windows**: `%APPDATA%\labkit\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use labkit_core::config::Config;
//!
//! let mut config = Config::load()?;
//! config.set("gitlab.url", "https://gitlab.example.com")?;
//! config.set("gitlab.per_page", "50")?;
//! config.save()?;
//!
//! let params = config.connection();
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "labkit";

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// The only API version the remote serves.
pub const DEFAULT_API_VERSION: u32 = 4;

/// Page size when none is configured.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Hard page size ceiling enforced by the remote API.
pub const MAX_PER_PAGE: u32 = 100;

/// Retry ceiling for transient errors when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

// =============================================================================
// Configuration structures
// =============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitLab connection parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<ConnectionParams>,
}

/// Everything needed to build a client handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Instance URL, e.g. `https://gitlab.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_token: Option<String>,

    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,

    /// Seconds per HTTP round trip
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Items per page; the remote caps this at 100
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Retry 500, 502, 503, 504 and 52x responses
    #[serde(default)]
    pub retry_transient_errors: bool,

    /// Extra attempts after the first when retrying transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_ssl_verify() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_api_version() -> u32 {
    DEFAULT_API_VERSION
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            url: None,
            private_token: None,
            oauth_token: None,
            job_token: None,
            ssl_verify: default_ssl_verify(),
            timeout: default_timeout(),
            api_version: default_api_version(),
            per_page: default_per_page(),
            retry_transient_errors: false,
            max_retries: default_max_retries(),
        }
    }
}

/// The single credential handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Private(String),
    OAuth(String),
    Job(String),
    Anonymous,
}

impl Credential {
    /// Credential kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Private(_) => "private",
            Credential::OAuth(_) => "oauth",
            Credential::Job(_) => "job",
            Credential::Anonymous => "anonymous",
        }
    }
}

impl ConnectionParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Pick one credential: private > oauth > job, else anonymous.
    ///
    /// Goes by presence only. A configured empty string still counts.
    pub fn credential(&self) -> Credential {
        if let Some(token) = &self.private_token {
            Credential::Private(token.clone())
        } else if let Some(token) = &self.oauth_token {
            Credential::OAuth(token.clone())
        } else if let Some(token) = &self.job_token {
            Credential::Job(token.clone())
        } else {
            Credential::Anonymous
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// =============================================================================
// Config implementation
// =============================================================================

fn file_error(message: String) -> Error {
    Error::Config(ConfigError::File(message))
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| file_error(format!("Invalid value '{}' for {}: {}", value, field, e)))
}

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| file_error("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| file_error(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| file_error(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| file_error(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| file_error(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| file_error(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Connection parameters, with defaults when no `[gitlab]` table exists.
    pub fn connection(&self) -> ConnectionParams {
        self.gitlab.clone().unwrap_or_default()
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `gitlab.field` (e.g., `gitlab.url`, `gitlab.per_page`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let field = split_key(key)?;
        let params = self.gitlab.get_or_insert_with(ConnectionParams::default);

        match field {
            "url" => params.url = Some(value.to_string()),
            "private_token" => params.private_token = Some(value.to_string()),
            "oauth_token" => params.oauth_token = Some(value.to_string()),
            "job_token" => params.job_token = Some(value.to_string()),
            "ssl_verify" => params.ssl_verify = parse_field(field, value)?,
            "timeout" => params.timeout = parse_field(field, value)?,
            "api_version" => params.api_version = parse_field(field, value)?,
            "per_page" => params.per_page = parse_field(field, value)?,
            "retry_transient_errors" => params.retry_transient_errors = parse_field(field, value)?,
            "max_retries" => params.max_retries = parse_field(field, value)?,
            _ => {
                return Err(file_error(format!(
                    "Unknown GitLab config field: {}",
                    field
                )))
            }
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    ///
    /// Key format: `gitlab.field` (e.g., `gitlab.url`, `gitlab.per_page`)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let field = split_key(key)?;
        let Some(params) = &self.gitlab else {
            return Ok(None);
        };

        match field {
            "url" => Ok(params.url.clone()),
            "private_token" => Ok(params.private_token.clone()),
            "oauth_token" => Ok(params.oauth_token.clone()),
            "job_token" => Ok(params.job_token.clone()),
            "ssl_verify" => Ok(Some(params.ssl_verify.to_string())),
            "timeout" => Ok(Some(params.timeout.to_string())),
            "api_version" => Ok(Some(params.api_version.to_string())),
            "per_page" => Ok(Some(params.per_page.to_string())),
            "retry_transient_errors" => Ok(Some(params.retry_transient_errors.to_string())),
            "max_retries" => Ok(Some(params.max_retries.to_string())),
            _ => Err(file_error(format!(
                "Unknown GitLab config field: {}",
                field
            ))),
        }
    }
}

fn split_key(key: &str) -> Result<&str> {
    match key.split_once('.') {
        Some(("gitlab", field)) if !field.contains('.') => Ok(field),
        Some((provider, field)) if !field.contains('.') => {
            Err(file_error(format!("Unknown provider: {}", provider)))
        }
        _ => Err(file_error(format!(
            "Invalid config key '{}'. Expected format: gitlab.field",
            key
        ))),
    }
}

// =============================================================================
// Tests
// =============================================================================
