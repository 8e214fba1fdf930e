//! Query execution and result shaping for query-gate.
//!
//! This module ties the classifier and the backends together and turns raw
//! backend rows into the JSON-safe wire contract.

mod gateway;
mod result;
mod serialize;

pub use gateway::Gateway;
pub use result::{QueryRequest, ResponseBody, ResultSet};
pub use serialize::{format_temporal, serialize, serialize_row};
