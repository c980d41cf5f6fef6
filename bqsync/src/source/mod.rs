//! The replication seam: where change notifications come from and where positions are
//! acknowledged.

pub mod base;
pub mod json;
pub mod memory;

pub use base::ReplicationSource;
pub use json::JsonLinesSource;
