use std::sync::Arc;

use crate::types::{ChangeEvent, ChangeKind, LogPosition, RawValue, RowImage, TableSchema};

/// Log file used by test positions.
pub const TEST_LOG_FILE: &str = "mysql-bin.000001";

/// Returns a position in [`TEST_LOG_FILE`].
pub fn position(offset: u64) -> LogPosition {
    LogPosition::new(TEST_LOG_FILE, offset)
}

/// Builds a row image from anything convertible into raw values.
pub fn row<V>(values: impl IntoIterator<Item = V>) -> RowImage
where
    V: Into<RawValue>,
{
    RowImage::new(values.into_iter().map(Into::into).collect())
}

/// Builds a change event on `table`.
pub fn change_event(
    table: &Arc<TableSchema>,
    kind: ChangeKind,
    rows: Vec<RowImage>,
    offset: u64,
) -> ChangeEvent {
    ChangeEvent {
        table: table.clone(),
        kind,
        rows,
        position: position(offset),
    }
}
