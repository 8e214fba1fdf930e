//! Integration tests for query-gate.

pub mod gateway_test;
pub mod postgres_test;
pub mod sample_test;
