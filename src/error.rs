//! Error types for query-gate.
//!
//! Every failure the gateway can report is one `GatewayError` variant. The
//! variants double as the caller-facing taxonomy: `to_body()` renders the
//! `{error, details}` wire shape and `status_class()` tells transport adapters
//! which class of status to use.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request carried no query text (missing field or blank string).
    #[error("Query parameter is required")]
    MissingQuery,

    /// The classifier rejected the query as potentially mutating.
    #[error("Only SELECT queries are allowed")]
    NotReadOnly,

    /// Connection failures, connect timeouts and server-side cancellations.
    #[error("Database connection failed: {0}")]
    BackendUnavailable(String),

    /// The backend rejected the query body (syntax errors, unknown tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// The bundled sample database file could not be found.
    #[error("Sample database not found at {}", .0.display())]
    SampleDataMissing(PathBuf),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else. Details are logged, never shown to the caller.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates a backend-unavailable error with the given message.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingQuery => "Invalid Request",
            Self::NotReadOnly => "Forbidden Query",
            Self::BackendUnavailable(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::SampleDataMissing(_) => "Sample Data Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingQuery => ErrorKind::MissingQuery,
            Self::NotReadOnly => ErrorKind::NotReadOnly,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Query(_) => ErrorKind::QuerySyntaxOrExecutionError,
            Self::SampleDataMissing(_) => ErrorKind::SampleDataMissing,
            Self::Config(_) | Self::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// Returns the status class an adapter should map this error onto.
    pub fn status_class(&self) -> StatusClass {
        self.kind().status_class()
    }

    /// Returns true if a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::BackendUnavailable)
    }

    /// Renders the caller-facing `{error, details}` body.
    ///
    /// Unknown faults only carry a generic message.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::MissingQuery | Self::NotReadOnly => ErrorBody::new(self.to_string()),
            Self::BackendUnavailable(detail) => {
                ErrorBody::with_details("Database connection failed", detail.clone())
            }
            Self::Query(detail) => ErrorBody::with_details("Query error", detail.clone()),
            Self::SampleDataMissing(path) => ErrorBody::with_details(
                "Sample database not found",
                path.display().to_string(),
            ),
            Self::Config(_) | Self::Internal(_) => ErrorBody::new("Internal error"),
        }
    }
}

/// Caller-visible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingQuery,
    NotReadOnly,
    BackendUnavailable,
    QuerySyntaxOrExecutionError,
    SampleDataMissing,
    Unknown,
}

impl ErrorKind {
    /// Maps the kind onto a transport-neutral status class.
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::NotReadOnly => StatusClass::Forbidden,
            Self::BackendUnavailable => StatusClass::ServiceUnavailable,
            Self::MissingQuery | Self::QuerySyntaxOrExecutionError => StatusClass::BadRequest,
            Self::SampleDataMissing | Self::Unknown => StatusClass::InternalError,
        }
    }
}

/// Status classes used by transport adapters (HTTP, function runtimes, chat tools).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    BadRequest,
    Forbidden,
    ServiceUnavailable,
    InternalError,
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad request"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::ServiceUnavailable => write!(f, "service unavailable"),
            Self::InternalError => write!(f, "internal error"),
        }
    }
}

/// Failure body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
