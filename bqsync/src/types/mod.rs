//! Common types used throughout the change propagation engine.
//!
//! Includes raw values as delivered by the replication stream, canonical cells accepted by the
//! warehouse, table metadata, change events and the rows and predicates sent downstream.

mod cell;
mod event;
mod schema;
mod target;
mod value;

pub use cell::*;
pub use event::*;
pub use schema::*;
pub use target::*;
pub use value::*;
