//! Conversions from raw replication values to canonical warehouse values.

pub mod column;

pub use column::{ColumnCodec, SourceTimezone, normalize_lookup_value};
