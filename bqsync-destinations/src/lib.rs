//! Warehouse implementations for bqsync.
//!
//! The engine talks to warehouses only through [`bqsync::destination::Warehouse`]; this crate
//! provides the BigQuery implementation used in production.

#[cfg(feature = "bigquery")]
pub mod bigquery;
#[cfg(feature = "bigquery")]
pub mod encryption;
