//! query-gate - A read-only SQL query gateway.
//!
//! Accepts free-text SQL, refuses anything that could write, runs the rest
//! on PostgreSQL or a bundled SQLite sample database and returns a bounded,
//! JSON-safe result set.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod safety;

pub use error::{GatewayError, Result};
pub use query::{Gateway, QueryRequest, ResultSet};
