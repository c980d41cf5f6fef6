use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncError};
use crate::sync_error;
use crate::types::{RawValue, TableName, TableSchema};

/// Position in the source replication log.
///
/// Positions are monotonic within a replication stream: a later event never carries a smaller
/// position than an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogPosition {
    /// Name of the log file.
    pub file: String,
    /// Byte offset of the event inside `file`.
    pub offset: u64,
}

impl LogPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.offset)
    }
}

/// Row-level action detected in the replication log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "insert" => Ok(ChangeKind::Insert),
            "update" => Ok(ChangeKind::Update),
            "delete" => Ok(ChangeKind::Delete),
            other => Err(sync_error!(
                ErrorKind::SourceProtocolError,
                "Unknown row change action",
                format!("the replication client reported action `{other}`")
            )),
        }
    }
}

/// Column values of one row at a point in time, in table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowImage(pub Vec<RawValue>);

impl RowImage {
    pub fn new(values: Vec<RawValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[RawValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RawValue>> for RowImage {
    fn from(values: Vec<RawValue>) -> Self {
        Self(values)
    }
}

/// A row-level change of one source table.
///
/// Insert and delete events carry one image per affected row. Update events carry a flat list of
/// `[old, new, old, new, ...]` images.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Arc<TableSchema>,
    pub kind: ChangeKind,
    pub rows: Vec<RowImage>,
    pub position: LogPosition,
}

/// A notification delivered by the replication client.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    /// The client switched to a new log file.
    Rotate { position: LogPosition },
    /// The structure of a table changed; the schema replaces any cached one.
    TableChanged { schema: TableSchema },
    /// Rows of a table were inserted, updated or deleted.
    Rows {
        table: TableName,
        kind: ChangeKind,
        rows: Vec<RowImage>,
        position: LogPosition,
    },
    /// A transaction committed at `position`.
    TransactionBoundary { position: LogPosition },
    /// The client reports that the stream is consistent up to `position`.
    PositionSynced { position: LogPosition },
}

impl ReplicationEvent {
    /// Short name of the notification, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ReplicationEvent::Rotate { .. } => "rotate",
            ReplicationEvent::TableChanged { .. } => "table_changed",
            ReplicationEvent::Rows { .. } => "rows",
            ReplicationEvent::TransactionBoundary { .. } => "xid",
            ReplicationEvent::PositionSynced { .. } => "position_synced",
        }
    }
}
