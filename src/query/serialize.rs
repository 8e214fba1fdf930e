//! Conversion of fetched cells into JSON-safe values.

use crate::db::{Cell, Temporal};
use chrono::SecondsFormat;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};

/// Converts one cell into a JSON-safe value.
pub fn serialize(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::from(*i),
        Cell::Float(f) => float_value(*f),
        Cell::Decimal(d) => match d.to_f64() {
            Some(f) => float_value(f),
            None => Value::String(d.to_string()),
        },
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Bytes(bytes) => Value::String(hex::encode(bytes)),
        Cell::Temporal(t) => Value::String(format_temporal(t)),
        Cell::Other(s) => Value::String(s.clone()),
    }
}

/// Serializes a whole row against its column names.
///
/// Later columns overwrite earlier ones when names repeat.
pub fn serialize_row(columns: &[String], row: &[Cell]) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::with_capacity(columns.len());
    for (name, cell) in columns.iter().zip(row) {
        map.insert(name.clone(), serialize(cell));
    }
    map
}

/// Formats a temporal value as ISO-8601 text.
pub fn format_temporal(value: &Temporal) -> String {
    match value {
        Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
        Temporal::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        Temporal::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        Temporal::DateTimeTz(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}
