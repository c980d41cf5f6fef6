use std::fmt;

use crate::types::{Cell, LogPosition};

/// Token identifying the log entry a warehouse row was produced from.
///
/// Re-processing the same log entry yields the same key, which lets the warehouse upload path
/// discard duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&LogPosition> for DedupKey {
    fn from(position: &LogPosition) -> Self {
        DedupKey(position.to_string())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row ready to be uploaded to the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    /// Target column names with their canonical values.
    pub values: Vec<(String, Cell)>,
    /// Key shared by every row produced from the same event.
    pub dedup_key: DedupKey,
    /// Position of the row inside its event's batch.
    pub ordinal: usize,
}

impl TargetRow {
    /// Returns the per-row deduplication token handed to the warehouse.
    ///
    /// It combines the event key with the row ordinal, so sibling rows of one event are never
    /// mistaken for duplicates of each other while a redelivered event maps to the same tokens.
    pub fn insert_id(&self) -> String {
        format!("{}:{}", self.dedup_key, self.ordinal)
    }

    /// Returns the value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }
}

/// Equality conjunction over the primary key columns of one row.
///
/// Always contains at least one column.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePredicate {
    /// Warehouse table to delete from.
    pub table: String,
    /// Primary key column names with their canonical values, in key order.
    pub columns: Vec<(String, Cell)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_ids_are_unique_per_row_and_stable_per_position() {
        let key = DedupKey::from(&LogPosition::new("mysql-bin.000003", 1200));
        let first = TargetRow {
            values: vec![],
            dedup_key: key.clone(),
            ordinal: 0,
        };
        let second = TargetRow {
            ordinal: 1,
            ..first.clone()
        };

        assert_eq!(first.insert_id(), "mysql-bin.000003:1200:0");
        assert_ne!(first.insert_id(), second.insert_id());
        assert_eq!(
            DedupKey::from(&LogPosition::new("mysql-bin.000003", 1200)),
            key
        );
    }
}
