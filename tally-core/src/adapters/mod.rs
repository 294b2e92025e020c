//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for both collection stores (used by the CLI)
//! - In-memory stores for tests and embedders
//! - Demo transactions and starter rules

pub mod demo;
pub mod duckdb;
pub mod memory;
