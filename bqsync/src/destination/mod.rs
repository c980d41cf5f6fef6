//! The warehouse seam: where materialized rows and delete predicates are sent.

pub mod base;
pub mod memory;

pub use base::Warehouse;
