//! Database abstraction layer for query-gate.
//!
//! Provides a trait-based interface over the two engines queries can run on,
//! allowing the gateway to use either backend interchangeably.

mod mock;
mod postgres;
mod sqlite;
mod types;

pub use mock::{FailingBackend, MockBackend};
pub use postgres::PostgresBackend;
pub use sqlite::{seed_sample_database, sample_database_info, SampleInfo, SqliteBackend};
pub use types::{Cell, DataSource, RawRows, Temporal};

use crate::config::{BackendSelection, Config};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Creates the backend chosen by the configuration.
///
/// This is the central factory function for backends. No connection is
/// opened here; each `run` call opens and closes its own.
pub fn from_config(config: &Config) -> Result<Arc<dyn QueryBackend>> {
    match config.backend_selection() {
        BackendSelection::Production(url) => {
            let backend = PostgresBackend::new(&url, config.limits)?;
            Ok(Arc::new(backend))
        }
        BackendSelection::Sample => {
            let backend = SqliteBackend::new(config.sample_path(), config.limits);
            Ok(Arc::new(backend))
        }
    }
}

/// Trait implemented by every query backend.
///
/// Implementations run the query verbatim on a connection scoped to the
/// call, fetch at most the configured row cap and release the connection on
/// every exit path.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Identifies the backend in results and logs.
    fn data_source(&self) -> DataSource;

    /// Executes a query that has already passed read-only classification.
    async fn run(&self, sql: &str) -> Result<RawRows>;
}
