//! Application configuration module
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (`config.yaml` unless a path is given), then `INVENTORY__SECTION__KEY`
//! environment variables. A `.env` file is loaded first when present.
//! The resulting [`Settings`] value is passed explicitly to whatever needs it.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required setting: {0}")]
    MissingValue(String),
}

/// Include/exclude substring filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NameFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Settings for capturing an inventory
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateConfig {
    /// postgres:// connection string; falls back to `DATABASE_URL`
    pub database_url: Option<String>,
    pub users: NameFilter,
}

impl CreateConfig {
    pub fn resolve_database_url(&self) -> Result<String, ConfigError> {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                ConfigError::MissingValue(
                    "create.database_url (or DATABASE_URL) must be set".to_string(),
                )
            })
    }
}

/// How detected changes are recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// One structured log event per change
    #[default]
    Log,
    /// One JSON object per line
    Json,
}

/// Settings for change detection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangesConfig {
    pub sink: SinkKind,
    /// Destination for the JSON sink; stdout when unset
    pub output: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(127, 0, 0, 1),
            port: 3000,
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: Option<String>,
}

/// Complete application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub create: CreateConfig,
    pub changes: ChangesConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the given file (required) or `config.yaml` (optional)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("INVENTORY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
