//! Raw result types produced by the backends.
//!
//! Backends hand back `Cell`s, a closed set of value shapes, and leave JSON
//! conversion to the serializer so both engines go through the same mapping.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Raw rows fetched from a backend, before serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRows {
    /// Column names in backend-reported order.
    pub columns: Vec<String>,

    /// Fetched rows, at most the configured row cap.
    pub rows: Vec<Vec<Cell>>,

    /// Whether the row cap was reached.
    pub truncated: bool,
}

impl RawRows {
    /// Creates raw rows, computing `truncated` against the given cap.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>, row_cap: usize) -> Self {
        let truncated = rows.len() >= row_cap;
        Self {
            columns,
            rows,
            truncated,
        }
    }

    /// Returns the number of fetched rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Identifies which backend served a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Production,
    Sample,
}

impl DataSource {
    /// Returns the source tag as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sample => "sample",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date/time value decoded from either backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temporal {
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<FixedOffset>),
}

/// A single fetched value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Exact numeric (NUMERIC/DECIMAL).
    Decimal(Decimal),

    /// Text value.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Date, time or timestamp.
    Temporal(Temporal),

    /// Any other type, already rendered to its textual form.
    Other(String),
}

impl Cell {
    /// Builds a cell from a JSON scalar.
    ///
    /// Arrays and objects become `Other` with their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Cell::Null,
            JsonValue::Bool(b) => Cell::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n
                    .as_f64()
                    .map(Cell::Float)
                    .unwrap_or_else(|| Cell::Other(n.to_string())),
            },
            JsonValue::String(s) => Cell::Text(s.clone()),
            other => Cell::Other(other.to_string()),
        }
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Int(v as i64)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<Decimal> for Cell {
    fn from(v: Decimal) -> Self {
        Cell::Decimal(v)
    }
}

impl From<Vec<u8>> for Cell {
    fn from(v: Vec<u8>) -> Self {
        Cell::Bytes(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Temporal(Temporal::Date(v))
    }
}

impl From<NaiveTime> for Cell {
    fn from(v: NaiveTime) -> Self {
        Cell::Temporal(Temporal::Time(v))
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(v: NaiveDateTime) -> Self {
        Cell::Temporal(Temporal::DateTime(v))
    }
}

impl From<DateTime<FixedOffset>> for Cell {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Cell::Temporal(Temporal::DateTimeTz(v))
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Cell::Null,
        }
    }
}
