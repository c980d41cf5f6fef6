//! Helpers for building table schemas, row images and change events in tests.
//!
//! The in-memory collaborators live next to their traits:
//! [`crate::destination::memory::MemoryWarehouse`], [`crate::lookup::memory::MemoryLookupClient`]
//! and [`crate::source::memory::MemorySource`].

pub mod event;
pub mod schema;
