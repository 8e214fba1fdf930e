//! Configuration management for query-gate.
//!
//! Handles loading configuration from TOML files and environment variables.
//! The configuration decides which backend serves queries and carries the
//! row cap and timeout constants; it is read once at startup and handed to
//! the gateway as a value.

use crate::db::DataSource;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Connection string value that explicitly selects the sample database.
pub const SAMPLE_SENTINEL: &str = "sample";

/// Environment variable holding the production connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable overriding the sample database location.
pub const SAMPLE_DB_ENV: &str = "QUERY_GATE_SAMPLE_DB";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// PostgreSQL connection string, or `sample` to force the sample database.
    pub database_url: Option<String>,

    /// Location of the bundled SQLite sample database.
    pub sample_db_path: Option<PathBuf>,

    /// Row cap and timeouts.
    #[serde(default)]
    pub limits: Limits,
}

/// Execution bounds applied to every query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of rows fetched per query.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,

    /// Production connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Production server-side statement timeout.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    /// Sample database busy/lock timeout.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_row_cap() -> usize {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_statement_timeout_secs() -> u64 {
    30
}

fn default_busy_timeout_secs() -> u64 {
    30
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            row_cap: default_row_cap(),
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_secs: default_statement_timeout_secs(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl Limits {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    /// Rejects zero bounds.
    pub fn validate(&self) -> Result<()> {
        if self.row_cap == 0 {
            return Err(GatewayError::config("limits.row_cap must be at least 1"));
        }
        for (name, value) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("statement_timeout_secs", self.statement_timeout_secs),
            ("busy_timeout_secs", self.busy_timeout_secs),
        ] {
            if value == 0 {
                return Err(GatewayError::config(format!(
                    "limits.{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Which backend serves queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// PostgreSQL at the given connection string.
    Production(String),
    /// The bundled SQLite sample database.
    Sample,
}

impl BackendSelection {
    /// Picks Production for a configured, non-sentinel connection string and
    /// Sample otherwise.
    pub fn resolve(database_url: Option<&str>) -> Self {
        match database_url.map(str::trim) {
            Some(url) if !url.is_empty() && !url.eq_ignore_ascii_case(SAMPLE_SENTINEL) => {
                Self::Production(url.to_string())
            }
            _ => Self::Sample,
        }
    }

    /// Returns the data source tag for this selection.
    pub fn data_source(&self) -> DataSource {
        match self {
            Self::Production(_) => DataSource::Production,
            Self::Sample => DataSource::Sample,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("query-gate")
            .join("config.toml")
    }

    /// Returns the default sample database path for the current platform.
    pub fn default_sample_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("query-gate")
            .join("sample.db")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            GatewayError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills unset fields from `DATABASE_URL` and `QUERY_GATE_SAMPLE_DB`.
    pub fn apply_env_defaults(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Fills unset fields using the given variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.database_url.is_none() {
            self.database_url = lookup(DATABASE_URL_ENV);
        }
        if self.sample_db_path.is_none() {
            self.sample_db_path = lookup(SAMPLE_DB_ENV).map(PathBuf::from);
        }
    }

    /// Applies command-line overrides, which take precedence over everything else.
    pub fn merge_overrides(&mut self, database_url: Option<&str>, sample_db_path: Option<&Path>) {
        if let Some(url) = database_url {
            self.database_url = Some(url.to_string());
        }
        if let Some(path) = sample_db_path {
            self.sample_db_path = Some(path.to_path_buf());
        }
    }

    /// Resolves the backend selection.
    pub fn backend_selection(&self) -> BackendSelection {
        BackendSelection::resolve(self.database_url.as_deref())
    }

    /// Returns the sample database path, falling back to the platform default.
    pub fn sample_path(&self) -> PathBuf {
        self.sample_db_path
            .clone()
            .unwrap_or_else(Self::default_sample_path)
    }

    /// Validates limits and, when Production is selected, the connection string.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if let BackendSelection::Production(url) = self.backend_selection() {
            validate_connection_string(&url)?;
        }
        Ok(())
    }

    /// Returns a display-safe description of the selected backend.
    pub fn display_backend(&self) -> String {
        match self.backend_selection() {
            BackendSelection::Production(url) => {
                format!("production ({})", redact_connection_string(&url))
            }
            BackendSelection::Sample => format!("sample ({})", self.sample_path().display()),
        }
    }
}

/// Checks that a connection string is a postgres URL.
pub fn validate_connection_string(conn_str: &str) -> Result<()> {
    let url = Url::parse(conn_str)
        .map_err(|e| GatewayError::config(format!("Invalid connection string: {e}")))?;

    if url.scheme() != "postgres" && url.scheme() != "postgresql" {
        return Err(GatewayError::config(format!(
            "Invalid scheme '{}'. Expected 'postgres' or 'postgresql'",
            url.scheme()
        )));
    }

    Ok(())
}

/// Replaces the password in a connection string so it can be logged.
pub fn redact_connection_string(conn_str: &str) -> String {
    match Url::parse(conn_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid connection string>".to_string(),
    }
}
