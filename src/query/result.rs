//! Wire shapes for requests and responses.

use super::serialize::serialize_row;
use crate::db::{DataSource, RawRows};
use crate::error::{ErrorBody, GatewayError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A query request as sent by callers: `{"query": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

impl QueryRequest {
    /// Creates a request carrying the given query text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    /// Parses a request body.
    ///
    /// A body that is not a JSON object with a string `query` is a bad
    /// request, reported the same way as a missing query.
    pub fn from_json(body: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::debug!("Invalid request JSON: {e}");
            GatewayError::MissingQuery
        })
    }
}

/// Successful query output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// Column names in backend-reported order.
    pub columns: Vec<String>,

    /// One mapping per row, keyed by column name.
    pub rows: Vec<Map<String, Value>>,

    /// Number of rows returned.
    pub row_count: usize,

    /// Whether the row cap was reached.
    pub truncated: bool,

    /// Set only when the sample backend served the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,

    /// Present only when the result was truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultSet {
    /// Assembles a result set from raw backend rows.
    pub fn from_raw(raw: RawRows, source: DataSource, row_cap: usize) -> Self {
        let rows: Vec<_> = raw
            .rows
            .iter()
            .map(|row| serialize_row(&raw.columns, row))
            .collect();

        Self {
            row_count: rows.len(),
            rows,
            columns: raw.columns,
            truncated: raw.truncated,
            data_source: (source == DataSource::Sample).then_some(source),
            message: raw
                .truncated
                .then(|| format!("Results truncated to {row_cap} rows")),
        }
    }
}

/// Either wire body, for front ends that print one JSON document per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success(ResultSet),
    Failure(ErrorBody),
}

impl ResponseBody {
    /// Returns true for the success body.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<ResultSet, GatewayError>> for ResponseBody {
    fn from(result: Result<ResultSet, GatewayError>) -> Self {
        match result {
            Ok(set) => Self::Success(set),
            Err(e) => Self::Failure(e.to_body()),
        }
    }
}
