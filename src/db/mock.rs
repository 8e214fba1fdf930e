//! Mock backends for testing.
//!
//! Provide in-memory stand-ins for the real engines so the gateway can be
//! exercised without a database.

use super::{Cell, DataSource, QueryBackend, RawRows};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A mock backend that returns predefined rows.
#[derive(Debug)]
pub struct MockBackend {
    source: DataSource,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    row_cap: usize,
    calls: AtomicUsize,
    last_sql: Mutex<Option<String>>,
}

impl MockBackend {
    /// Creates a mock backend that returns an empty result.
    pub fn new(source: DataSource) -> Self {
        Self::with_rows(source, Vec::<String>::new(), Vec::new())
    }

    /// Creates a mock backend that returns the given columns and rows.
    pub fn with_rows(
        source: DataSource,
        columns: impl IntoIterator<Item = impl Into<String>>,
        rows: Vec<Vec<Cell>>,
    ) -> Self {
        Self {
            source,
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            row_cap: 1000,
            calls: AtomicUsize::new(0),
            last_sql: Mutex::new(None),
        }
    }

    /// Creates a mock backend whose query would produce `count` rows of a
    /// single integer column `n`.
    pub fn sequence(source: DataSource, count: usize) -> Self {
        let rows = (1..=count as i64).map(|n| vec![Cell::Int(n)]).collect();
        Self::with_rows(source, ["n"], rows)
    }

    /// Sets the row cap applied when returning rows.
    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap;
        self
    }

    /// Returns how many times `run` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the SQL text passed to the most recent `run`.
    pub fn last_sql(&self) -> Option<String> {
        self.last_sql.lock().ok().and_then(|sql| sql.clone())
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    fn data_source(&self) -> DataSource {
        self.source
    }

    async fn run(&self, sql: &str) -> Result<RawRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_sql.lock() {
            *last = Some(sql.to_string());
        }

        let rows = self.rows.iter().take(self.row_cap).cloned().collect();
        Ok(RawRows::new(self.columns.clone(), rows, self.row_cap))
    }
}

/// A mock backend whose every call fails.
#[derive(Debug)]
pub struct FailingBackend {
    source: DataSource,
    make_error: fn() -> GatewayError,
    calls: AtomicUsize,
}

impl FailingBackend {
    /// Creates a backend that fails with the error built by `make_error`.
    pub fn new(source: DataSource, make_error: fn() -> GatewayError) -> Self {
        Self {
            source,
            make_error,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times `run` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for FailingBackend {
    fn data_source(&self) -> DataSource {
        self.source
    }

    async fn run(&self, _sql: &str) -> Result<RawRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.make_error)())
    }
}
