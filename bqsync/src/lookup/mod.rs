//! The relational query seam used by `rewrite-via-query` actions.

pub mod base;
pub mod disabled;
pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use base::{LookupClient, LookupResult, QueryParameter};
pub use disabled::DisabledLookup;
