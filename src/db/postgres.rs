//! PostgreSQL backend implementation.
//!
//! Provides the `PostgresBackend` struct that implements the `QueryBackend` trait
//! for the production database using sqlx. Every call opens one connection,
//! sets a server-side statement timeout, streams at most the row cap and
//! closes the connection again.

use crate::config::{validate_connection_string, Limits};
use crate::db::{Cell, DataSource, QueryBackend, RawRows};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgDatabaseError, PgRow, PgTypeInfo, PgTypeKind,
    PgValueFormat, PgValueRef,
};
use sqlx::{Column, Connection, Executor, Postgres, Row, TypeInfo, ValueRef};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extra time the client waits beyond the server-side statement timeout
/// before abandoning the connection itself.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// SQLSTATE raised when a statement is cancelled by `statement_timeout`.
const SQLSTATE_QUERY_CANCELED: &str = "57014";

/// PostgreSQL query backend.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    options: PgConnectOptions,
    limits: Limits,
}

impl PostgresBackend {
    /// Creates a backend for the given connection string.
    ///
    /// The string is parsed eagerly so configuration mistakes surface at
    /// startup instead of on the first query.
    pub fn new(conn_str: &str, limits: Limits) -> Result<Self> {
        validate_connection_string(conn_str)?;
        let options = PgConnectOptions::from_str(conn_str)
            .map_err(|e| GatewayError::config(format!("Invalid connection string: {e}")))?;
        Ok(Self { options, limits })
    }

    /// Opens a single connection, bounded by the connect timeout.
    async fn connect(&self) -> Result<PgConnection> {
        let timeout = self.limits.connect_timeout();
        match tokio::time::timeout(timeout, PgConnection::connect_with(&self.options)).await {
            Ok(Ok(conn)) => {
                debug!(
                    "Connected to {}:{}",
                    self.options.get_host(),
                    self.options.get_port()
                );
                Ok(conn)
            }
            Ok(Err(e)) => Err(self.map_connection_error(e)),
            Err(_) => Err(GatewayError::unavailable(format!(
                "Connection to {}:{} timed out after {} seconds",
                self.options.get_host(),
                self.options.get_port(),
                timeout.as_secs()
            ))),
        }
    }

    /// Maps sqlx connection errors to caller-facing messages.
    fn map_connection_error(&self, error: sqlx::Error) -> GatewayError {
        let host = self.options.get_host();
        let port = self.options.get_port();
        let user = self.options.get_username();
        let database = self.options.get_database().unwrap_or("unknown");

        let error_str = error.to_string().to_lowercase();

        if error_str.contains("connection refused") || error_str.contains("could not connect") {
            GatewayError::unavailable(format!(
                "Cannot connect to {host}:{port}. Check that the server is running."
            ))
        } else if error_str.contains("password authentication failed")
            || error_str.contains("authentication failed")
        {
            GatewayError::unavailable(format!("Authentication failed for user '{user}'."))
        } else if error_str.contains("does not exist") && error_str.contains("database") {
            GatewayError::unavailable(format!("Database '{database}' does not exist."))
        } else {
            GatewayError::unavailable(error.to_string())
        }
    }
}

#[async_trait]
impl QueryBackend for PostgresBackend {
    fn data_source(&self) -> DataSource {
        DataSource::Production
    }

    async fn run(&self, sql: &str) -> Result<RawRows> {
        let start = Instant::now();
        let mut conn = self.connect().await?;

        let guard = self.limits.statement_timeout() + CLIENT_TIMEOUT_GRACE;
        let outcome = tokio::time::timeout(guard, fetch_bounded(&mut conn, sql, &self.limits)).await;

        match outcome {
            Ok(result) => {
                if let Err(e) = conn.close().await {
                    debug!("Failed to close connection cleanly: {e}");
                }
                if let Ok(raw) = &result {
                    info!(
                        rows = raw.row_count(),
                        truncated = raw.truncated,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Production query finished"
                    );
                }
                result
            }
            Err(_) => {
                // The connection may be mid-result; drop it instead of closing.
                drop(conn);
                warn!(
                    "Query exceeded client-side guard of {} seconds",
                    guard.as_secs()
                );
                Err(GatewayError::unavailable(format!(
                    "Query timed out after {} seconds",
                    self.limits.statement_timeout_secs
                )))
            }
        }
    }
}

/// Applies the statement timeout, then streams at most `row_cap` rows.
async fn fetch_bounded(conn: &mut PgConnection, sql: &str, limits: &Limits) -> Result<RawRows> {
    let set_timeout = format!(
        "SET statement_timeout = {}",
        limits.statement_timeout().as_millis()
    );
    sqlx::query(&set_timeout)
        .execute(&mut *conn)
        .await
        .map_err(map_query_error)?;

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    {
        let mut stream = sqlx::query(sql).fetch(&mut *conn);
        while rows.len() < limits.row_cap {
            let Some(row) = stream.try_next().await.map_err(map_query_error)? else {
                break;
            };
            if columns.is_none() {
                columns = Some(column_names(&row));
            }
            rows.push(convert_row(&row));
        }
    }

    let columns = match columns {
        Some(columns) => columns,
        None => describe_columns(conn, sql).await,
    };

    Ok(RawRows::new(columns, rows, limits.row_cap))
}

/// Reads column names for a statement that returned no rows.
async fn describe_columns(conn: &mut PgConnection, sql: &str) -> Vec<String> {
    match (&mut *conn).describe(sql).await {
        Ok(describe) => describe
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
        Err(e) => {
            debug!("Could not describe result columns: {e}");
            Vec::new()
        }
    }
}

fn column_names(row: &PgRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Converts a sqlx PgRow to a row of cells.
fn convert_row(row: &PgRow) -> Vec<Cell> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info()))
        .collect()
}

/// Decodes a value, ignoring type mismatches.
fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(index).ok()
}

/// Converts a single column value from a PgRow to a cell.
fn convert_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Cell {
    let raw = match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => raw,
        _ => return Cell::Null,
    };
    let type_name = type_info.name();

    let cell = match type_name {
        "BOOL" => decode::<bool>(row, index).map(Cell::Bool),
        "INT2" => decode::<i16>(row, index).map(|v| Cell::Int(v as i64)),
        "INT4" => decode::<i32>(row, index).map(|v| Cell::Int(v as i64)),
        "INT8" => decode::<i64>(row, index).map(Cell::Int),
        "OID" => decode::<Oid>(row, index).map(|v| Cell::Int(v.0 as i64)),
        "FLOAT4" => decode::<f32>(row, index).map(|v| Cell::Float(v as f64)),
        "FLOAT8" => decode::<f64>(row, index).map(Cell::Float),
        // rust_decimal tops out at 28 digits and has no NaN or infinity.
        "NUMERIC" => decode::<rust_decimal::Decimal>(row, index)
            .map(Cell::Decimal)
            .or_else(|| numeric_to_f64(&raw).map(Cell::Float)),
        "MONEY" => decode::<PgMoney>(row, index).map(|v| Cell::Decimal(v.to_decimal(2))),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(Cell::Bytes),
        "DATE" => decode::<chrono::NaiveDate>(row, index).map(Cell::from),
        "TIME" => decode::<chrono::NaiveTime>(row, index).map(Cell::from),
        "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, index).map(Cell::from),
        "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, index)
            .map(|v| Cell::from(v.fixed_offset())),
        "TIMETZ" => decode::<PgTimeTz<chrono::NaiveTime, chrono::FixedOffset>>(row, index)
            .map(|v| Cell::Other(format!("{}{}", v.time, v.offset))),
        "INTERVAL" => decode::<PgInterval>(row, index).map(|v| Cell::Other(format_interval(&v))),
        "INET" | "CIDR" => binary_bytes(&raw)
            .and_then(|bytes| format_inet(bytes, type_name == "CIDR"))
            .map(Cell::Other),
        "UUID" => decode::<uuid::Uuid>(row, index).map(|v| Cell::Other(v.to_string())),
        "JSON" | "JSONB" => {
            decode::<serde_json::Value>(row, index).map(|v| Cell::Other(v.to_string()))
        }
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => {
            decode::<Vec<String>>(row, index).map(|v| Cell::Other(json_text(&v)))
        }
        "INT4[]" => decode::<Vec<i32>>(row, index).map(|v| Cell::Other(json_text(&v))),
        "INT8[]" => decode::<Vec<i64>>(row, index).map(|v| Cell::Other(json_text(&v))),
        _ => None,
    };

    cell.or_else(|| decode::<String>(row, index).map(Cell::Text))
        .unwrap_or_else(|| raw_text(&raw, type_info))
}

/// Renders a value that has no dedicated decoder.
///
/// Text-format values and enum labels are already text. Any other binary
/// payload that is not printable text is shown as `\x`-prefixed hex, the way
/// PostgreSQL prints bytea.
fn raw_text(raw: &PgValueRef<'_>, type_info: &PgTypeInfo) -> Cell {
    let bytes = raw.as_bytes().unwrap_or_default();
    let is_text = matches!(raw.format(), PgValueFormat::Text)
        || matches!(type_info.kind(), PgTypeKind::Enum(_));

    match std::str::from_utf8(bytes) {
        Ok(text) if is_text || !text.chars().any(char::is_control) => Cell::Text(text.to_string()),
        _ => {
            debug!("No decoder for column type {}; rendering as hex", type_info.name());
            Cell::Other(format!("\\x{}", hex::encode(bytes)))
        }
    }
}

fn binary_bytes<'r>(raw: &PgValueRef<'r>) -> Option<&'r [u8]> {
    match raw.format() {
        PgValueFormat::Binary => raw.as_bytes().ok(),
        PgValueFormat::Text => None,
    }
}

/// Reads a NUMERIC as a float when it does not fit a `Decimal`.
fn numeric_to_f64(raw: &PgValueRef<'_>) -> Option<f64> {
    match raw.format() {
        PgValueFormat::Text => raw.as_str().ok()?.parse().ok(),
        PgValueFormat::Binary => parse_numeric_binary(raw.as_bytes().ok()?),
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Parses PostgreSQL's binary NUMERIC layout: digit count, weight, sign and
/// display scale, followed by base-10000 digits.
fn parse_numeric_binary(bytes: &[u8]) -> Option<f64> {
    let word = |i: usize| {
        bytes
            .get(i..i + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
    };

    let ndigits = word(0)? as usize;
    let weight = word(2)? as i16;
    let sign = word(4)?;

    match sign {
        NUMERIC_NAN => return Some(f64::NAN),
        NUMERIC_PINF => return Some(f64::INFINITY),
        NUMERIC_NINF => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if ndigits == 0 {
        return Some(0.0);
    }

    let mut text = String::with_capacity(ndigits * 4 + 16);
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    text.push_str("0.");
    for i in 0..ndigits {
        text.push_str(&format!("{:04}", word(8 + 2 * i)?));
    }
    text.push_str(&format!("e{}", 4 * (i32::from(weight) + 1)));
    text.parse().ok()
}

/// Formats an interval the way PostgreSQL's default output style does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    push_unit(&mut parts, interval.months / 12, "year");
    push_unit(&mut parts, interval.months % 12, "mon");
    push_unit(&mut parts, interval.days, "day");

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 {
            "-"
        } else if interval.months < 0 || interval.days < 0 {
            "+"
        } else {
            ""
        };
        let total = interval.microseconds.unsigned_abs();
        let secs = total / 1_000_000;
        let micros = total % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if micros != 0 {
            time.push('.');
            time.push_str(format!("{micros:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

fn push_unit(parts: &mut Vec<String>, value: i32, unit: &str) {
    match value {
        0 => {}
        1 => parts.push(format!("1 {unit}")),
        n => parts.push(format!("{n} {unit}s")),
    }
}

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// Formats a binary INET/CIDR value. INET omits a full-length netmask.
fn format_inet(bytes: &[u8], cidr: bool) -> Option<String> {
    let [family, bits, _, len, addr @ ..] = bytes else {
        return None;
    };
    let (ip, max_bits): (IpAddr, u8) = match (*family, *len) {
        (PGSQL_AF_INET, 4) => (Ipv4Addr::from(<[u8; 4]>::try_from(addr).ok()?).into(), 32),
        (PGSQL_AF_INET6, 16) => (Ipv6Addr::from(<[u8; 16]>::try_from(addr).ok()?).into(), 128),
        _ => return None,
    };

    Some(if cidr || *bits != max_bits {
        format!("{ip}/{bits}")
    } else {
        ip.to_string()
    })
}

fn json_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Returns true for SQLSTATEs that mean the server, not the query, is the problem.
fn is_unavailable_sqlstate(code: &str) -> bool {
    code == SQLSTATE_QUERY_CANCELED
        || code.starts_with("08")
        || code.starts_with("53")
        || code.starts_with("57P")
}

/// Maps an execution-time sqlx error onto the gateway taxonomy.
fn map_query_error(error: sqlx::Error) -> GatewayError {
    match &error {
        sqlx::Error::Database(db_error) => {
            let code = db_error.code().map(|c| c.into_owned()).unwrap_or_default();
            let message = format_query_error(&error);
            if is_unavailable_sqlstate(&code) {
                GatewayError::unavailable(message)
            } else {
                GatewayError::query(message)
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => GatewayError::unavailable(error.to_string()),
        _ => GatewayError::internal(error.to_string()),
    }
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
