//! Query execution behind the read-only gate.
//!
//! The gateway validates the request, classifies it, runs it on the backend
//! chosen at construction and assembles the caller-facing result set. It
//! holds no mutable state, so one instance can be shared across tasks.

use std::sync::Arc;
use std::time::Instant;

use super::result::{QueryRequest, ResultSet};
use crate::config::{Config, Limits};
use crate::db::{self, DataSource, QueryBackend};
use crate::error::{ErrorKind, GatewayError, Result};
use crate::safety::{classify, Classification};

/// Read-only query gateway.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn QueryBackend>,
    limits: Limits,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("data_source", &self.backend.data_source())
            .field("limits", &self.limits)
            .finish()
    }
}

impl Gateway {
    /// Creates a gateway from configuration.
    ///
    /// Fails if the configuration is invalid. No connection is opened here.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = db::from_config(config)?;
        tracing::debug!(backend = %config.display_backend(), "Gateway configured");
        Ok(Self::with_backend(backend, config.limits))
    }

    /// Creates a gateway over an existing backend.
    pub fn with_backend(backend: Arc<dyn QueryBackend>, limits: Limits) -> Self {
        Self { backend, limits }
    }

    /// Returns which backend this gateway runs queries on.
    pub fn data_source(&self) -> DataSource {
        self.backend.data_source()
    }

    /// Handles a `{"query": ...}` request.
    pub async fn handle(&self, request: QueryRequest) -> Result<ResultSet> {
        match request.query {
            Some(query) => self.execute(&query).await,
            None => Err(GatewayError::MissingQuery),
        }
    }

    /// Validates, classifies and runs a query.
    ///
    /// Rejected queries never reach the backend. The original text, not the
    /// normalized form, is what gets executed.
    pub async fn execute(&self, raw: &str) -> Result<ResultSet> {
        if raw.trim().is_empty() {
            return Err(GatewayError::MissingQuery);
        }

        if let Classification::Rejected(reason) = classify(raw) {
            tracing::warn!(%reason, "Rejected query");
            return Err(GatewayError::NotReadOnly);
        }

        let source = self.backend.data_source();
        let start = Instant::now();
        let result = self.backend.run(raw).await;
        let elapsed = start.elapsed();

        match result {
            Ok(raw_rows) => {
                if raw_rows.truncated {
                    tracing::warn!(
                        backend = %source,
                        row_cap = self.limits.row_cap,
                        "Result truncated"
                    );
                }
                let set = ResultSet::from_raw(raw_rows, source, self.limits.row_cap);
                tracing::info!(
                    backend = %source,
                    rows = set.row_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Query completed"
                );
                Ok(set)
            }
            Err(e) => {
                if e.kind() == ErrorKind::Unknown {
                    tracing::error!(backend = %source, error = %e, "Query failed unexpectedly");
                } else {
                    tracing::info!(
                        backend = %source,
                        category = e.category(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Query failed"
                    );
                }
                Err(e)
            }
        }
    }
}
