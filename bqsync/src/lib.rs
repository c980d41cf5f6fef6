//! Propagates row changes from a MySQL replication stream into BigQuery.
//!
//! The crate is organised around a sequential [`pipeline::Pipeline`] that reads notifications
//! from a [`source::ReplicationSource`], keeps the latest table metadata, and hands each row
//! change to the [`replication::Dispatcher`]. The dispatcher resolves the per-table
//! [`rules::Rule`], decides through a routing table whether the change is materialized,
//! deleted or dropped, and calls the [`destination::Warehouse`] (optionally going through a
//! [`lookup::LookupClient`] first). Raw column values are canonicalized by the
//! [`conversions::ColumnCodec`].
//!
//! Every failure is a [`error::SyncError`] returned to the caller, which is expected to halt
//! replication so that the last acknowledged position stays the safe resume point.

pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod error;
pub mod lookup;
mod macros;
pub mod pipeline;
pub mod replication;
pub mod rules;
pub mod schema;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
