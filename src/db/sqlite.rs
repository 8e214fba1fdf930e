//! SQLite sample-data backend.
//!
//! Serves queries from a bundled SQLite file when no production database is
//! configured. The file is opened read-only and never created by `run`.
//!
//! SQLite has no statement timeout. The busy timeout only bounds waiting on
//! locks, so a read-only but expensive sample query (a large cross join, a
//! runaway recursive CTE) runs until it finishes or hits the row cap. This is
//! a known limitation of the sample backend.

use crate::config::Limits;
use crate::db::{Cell, DataSource, QueryBackend, RawRows};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, Sqlite, TypeInfo, ValueRef};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Seed script for the bundled sample database.
pub const SAMPLE_SEED: &str = include_str!("../../data/sample_seed.sql");

// Primary SQLite result codes that point at the environment rather than the query.
const SQLITE_IOERR: i32 = 10;
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_CANTOPEN: i32 = 14;
const SQLITE_NOTADB: i32 = 26;

/// SQLite sample database backend.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
    limits: Limits,
}

impl SqliteBackend {
    /// Creates a backend for the sample database at `path`.
    pub fn new(path: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    /// Returns the sample database location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        if !self.path.is_file() {
            return Err(GatewayError::SampleDataMissing(self.path.clone()));
        }

        let options = read_only_options(&self.path, self.limits.busy_timeout());
        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(map_sqlite_error)?;
        debug!("Opened sample database at {}", self.path.display());
        Ok(conn)
    }
}

#[async_trait]
impl QueryBackend for SqliteBackend {
    fn data_source(&self) -> DataSource {
        DataSource::Sample
    }

    async fn run(&self, sql: &str) -> Result<RawRows> {
        let start = Instant::now();
        let mut conn = self.connect().await?;

        let result = fetch_bounded(&mut conn, sql, self.limits.row_cap).await;

        if let Err(e) = conn.close().await {
            debug!("Failed to close sample database cleanly: {e}");
        }

        if let Ok(raw) = &result {
            info!(
                rows = raw.row_count(),
                truncated = raw.truncated,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Sample query finished"
            );
        }
        result
    }
}

fn read_only_options(path: &Path, busy_timeout: Duration) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .busy_timeout(busy_timeout)
}

/// Lower-cased names of every table column declared NUMERIC or DECIMAL.
///
/// sqlx reports such columns with no declared type, so this is the only way
/// to tell `49.00` stored as INTEGER apart from a plain integer.
async fn numeric_columns(conn: &mut SqliteConnection) -> HashSet<String> {
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT lower(p.name)
        FROM sqlite_master AS m
        JOIN pragma_table_info(m.name) AS p
        WHERE m.type = 'table'
          AND (upper(p.type) LIKE 'NUMERIC%' OR upper(p.type) LIKE 'DECIMAL%')
        "#,
    )
    .fetch_all(&mut *conn)
    .await;

    match names {
        Ok(names) => names.into_iter().collect(),
        Err(e) => {
            debug!("Could not read declared column types: {e}");
            HashSet::new()
        }
    }
}

/// Streams at most `row_cap` rows.
async fn fetch_bounded(conn: &mut SqliteConnection, sql: &str, row_cap: usize) -> Result<RawRows> {
    let numeric = numeric_columns(conn).await;
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    {
        let mut stream = sqlx::query(sql).fetch(&mut *conn);
        while rows.len() < row_cap {
            let Some(row) = stream.try_next().await.map_err(map_sqlite_error)? else {
                break;
            };
            if columns.is_none() {
                columns = Some(
                    row.columns()
                        .iter()
                        .map(|col| col.name().to_string())
                        .collect(),
                );
            }
            rows.push(convert_row(&row, &numeric));
        }
    }

    let columns = match columns {
        Some(columns) => columns,
        None => match (&mut *conn).describe(sql).await {
            Ok(describe) => describe
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe result columns: {e}");
                Vec::new()
            }
        },
    };

    Ok(RawRows::new(columns, rows, row_cap))
}

fn convert_row(row: &SqliteRow, numeric: &HashSet<String>) -> Vec<Cell> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let declared = match col.type_info().name() {
                "NULL" if numeric.contains(&col.name().to_lowercase()) => "NUMERIC",
                name => name,
            };
            convert_value(row, i, declared)
        })
        .collect()
}

fn unchecked<'r, T>(row: &'r SqliteRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Sqlite>,
{
    row.try_get_unchecked::<T, _>(index).ok()
}

/// Converts one value using its storage class, with the declared column
/// type as a hint for booleans, exact numerics and dates.
fn convert_value(row: &SqliteRow, index: usize, declared: &str) -> Cell {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Cell::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Cell::Null,
    };

    let hinted = match (declared, storage.as_str()) {
        ("BOOLEAN", "INTEGER") => unchecked::<bool>(row, index).map(Cell::Bool),
        ("NUMERIC", "INTEGER") => unchecked::<i64>(row, index).map(|v| Cell::Decimal(v.into())),
        ("DATE", "TEXT") => unchecked::<NaiveDate>(row, index).map(Cell::from),
        ("TIME", "TEXT") => unchecked::<NaiveTime>(row, index).map(Cell::from),
        ("DATETIME" | "TIMESTAMP", "TEXT") => unchecked::<NaiveDateTime>(row, index)
            .map(Cell::from)
            .or_else(|| unchecked::<DateTime<FixedOffset>>(row, index).map(Cell::from)),
        _ => None,
    };
    if let Some(cell) = hinted {
        return cell;
    }

    let cell = match storage.as_str() {
        "INTEGER" => unchecked::<i64>(row, index).map(Cell::Int),
        "REAL" => unchecked::<f64>(row, index).map(Cell::Float),
        "BLOB" => unchecked::<Vec<u8>>(row, index).map(Cell::Bytes),
        _ => unchecked::<String>(row, index).map(Cell::Text),
    };
    cell.unwrap_or(Cell::Null)
}

/// Maps a sqlx error from the sample database onto the gateway taxonomy.
fn map_sqlite_error(error: sqlx::Error) -> GatewayError {
    match &error {
        sqlx::Error::Database(db_error) => {
            let primary = db_error
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            let message = format!("ERROR: {}", db_error.message());
            match primary {
                Some(
                    SQLITE_BUSY | SQLITE_LOCKED | SQLITE_IOERR | SQLITE_CORRUPT | SQLITE_CANTOPEN
                    | SQLITE_NOTADB,
                ) => GatewayError::unavailable(message),
                _ => GatewayError::query(message),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
            GatewayError::unavailable(error.to_string())
        }
        _ => GatewayError::internal(error.to_string()),
    }
}

/// Summary of the sample database contents.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SampleInfo {
    pub database_type: &'static str,
    pub database_path: PathBuf,
    /// Row count per table.
    pub tables: BTreeMap<String, i64>,
    pub total_rows: i64,
}

/// Lists the sample database's tables with their row counts.
pub async fn sample_database_info(path: &Path, busy_timeout: Duration) -> Result<SampleInfo> {
    if !path.is_file() {
        return Err(GatewayError::SampleDataMissing(path.to_path_buf()));
    }

    let mut conn = SqliteConnection::connect_with(&read_only_options(path, busy_timeout))
        .await
        .map_err(map_sqlite_error)?;

    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
    )
    .fetch_all(&mut conn)
    .await
    .map_err(map_sqlite_error)?;

    let mut tables = BTreeMap::new();
    for name in names {
        let count_sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&name));
        let count: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut conn)
            .await
            .map_err(map_sqlite_error)?;
        tables.insert(name, count);
    }

    if let Err(e) = conn.close().await {
        debug!("Failed to close sample database cleanly: {e}");
    }

    let total_rows = tables.values().sum();
    Ok(SampleInfo {
        database_type: "sqlite",
        database_path: path.to_path_buf(),
        tables,
        total_rows,
    })
}

/// Writes the bundled sample database to `path`.
///
/// An existing file is only replaced when `force` is set.
pub async fn seed_sample_database(path: &Path, force: bool) -> Result<()> {
    if path.exists() {
        if !force {
            return Err(GatewayError::config(format!(
                "{} already exists. Use --force to replace it.",
                path.display()
            )));
        }
        std::fs::remove_file(path).map_err(|e| {
            GatewayError::internal(format!("Failed to remove {}: {e}", path.display()))
        })?;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            GatewayError::internal(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to create sample database: {e}")))?;

    sqlx::raw_sql(SAMPLE_SEED)
        .execute(&mut conn)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to seed sample database: {e}")))?;

    if let Err(e) = conn.close().await {
        debug!("Failed to close seeded database cleanly: {e}");
    }
    info!("Seeded sample database at {}", path.display());
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
