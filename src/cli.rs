//! Command-line argument parsing for query-gate.

use crate::config::{Config, DATABASE_URL_ENV};
use crate::error::{GatewayError, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

/// A read-only SQL query gateway.
#[derive(Parser, Debug)]
#[command(name = "query-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection string, or "sample" for the sample database
    #[arg(long, global = true, env = DATABASE_URL_ENV, value_name = "URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Path to the SQLite sample database
    #[arg(long, global = true, value_name = "PATH")]
    pub sample_db: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a query and print the result as JSON
    Query {
        /// SQL text, or "-" to read it from stdin
        #[arg(value_name = "SQL")]
        sql: String,
    },

    /// Run a {"query": ...} JSON request
    Request {
        /// Request file, or "-" to read it from stdin
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Describe the sample database
    Info,

    /// Create the sample database from the bundled seed script
    SeedSample {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Builds the effective configuration.
    ///
    /// Command-line values win over the config file, which wins over the
    /// environment. `--database-url` also reads `DATABASE_URL` through clap,
    /// so the environment value only counts as an override when no file
    /// value exists.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_from_file(&self.config_path())?;
        let env_url = std::env::var(DATABASE_URL_ENV).ok();
        let cli_url = self
            .database_url
            .as_deref()
            .filter(|url| env_url.as_deref() != Some(*url));
        config.apply_env_defaults();
        config.merge_overrides(cli_url, self.sample_db.as_deref());
        Ok(config)
    }
}

/// Reads an argument that may be "-" for stdin, or literal text.
pub fn read_sql_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        read_stdin()
    } else {
        Ok(arg.to_string())
    }
}

/// Reads a request file, or stdin when the path is "-".
pub fn read_request_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        return read_stdin();
    }
    let path = Path::new(arg);
    std::fs::read_to_string(path).map_err(|e| {
        GatewayError::config(format!(
            "Failed to read request file {}: {e}",
            path.display()
        ))
    })
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| GatewayError::config(format!("Failed to read stdin: {e}")))?;
    Ok(buf)
}
