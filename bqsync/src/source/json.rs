//! Replication source reading JSON-lines notifications.
//!
//! The replication client runs as a separate process and writes one notification per line. Each
//! line is an object tagged by `type`:
//!
//! ```json
//! {"type":"table_changed","table":{"schema":"shop","name":"orders"},"columns":[{"name":"id","type":"other"},{"name":"status","type":"enum","values":["new","paid"]}],"primary_key":[0]}
//! {"type":"rows","table":{"schema":"shop","name":"orders"},"action":"insert","rows":[[{"int":1},{"int":2}]],"position":{"file":"mysql-bin.000001","offset":120}}
//! {"type":"xid","position":{"file":"mysql-bin.000001","offset":151}}
//! ```
//!
//! Values are `null` (or `"null"`), `{"int":n}`, `{"uint":n}`, `{"float":x}`, `{"decimal":"s"}`,
//! `{"string":"s"}` or `{"bytes":"<base64>"}`. Acknowledgements are written back as
//! `{"ack":{"file":"...","offset":n}}` lines.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::trace;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::source::ReplicationSource;
use crate::sync_error;
use crate::types::{
    ChangeKind, ColumnSchema, ColumnType, LogPosition, RawValue, ReplicationEvent, RowImage,
    TableName, TableSchema,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ValueWire {
    Null,
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(String),
    String(String),
    Bytes(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ColumnTypeWire {
    Enum {
        values: Vec<String>,
    },
    Set {
        values: Vec<String>,
    },
    Bit,
    String,
    Json,
    Datetime,
    Timestamp,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnWire {
    name: String,
    #[serde(flatten)]
    typ: ColumnTypeWire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventWire {
    Rotate {
        position: LogPosition,
    },
    TableChanged {
        table: TableName,
        columns: Vec<ColumnWire>,
        #[serde(default)]
        primary_key: Vec<usize>,
    },
    Rows {
        table: TableName,
        action: String,
        rows: Vec<Vec<Option<ValueWire>>>,
        position: LogPosition,
    },
    Xid {
        position: LogPosition,
    },
    PositionSynced {
        position: LogPosition,
    },
}

#[derive(Debug, Serialize)]
struct AckWire<'a> {
    ack: &'a LogPosition,
}

impl From<ColumnTypeWire> for ColumnType {
    fn from(value: ColumnTypeWire) -> Self {
        match value {
            ColumnTypeWire::Enum { values } => ColumnType::Enum(values),
            ColumnTypeWire::Set { values } => ColumnType::Set(values),
            ColumnTypeWire::Bit => ColumnType::Bit,
            ColumnTypeWire::String => ColumnType::String,
            ColumnTypeWire::Json => ColumnType::Json,
            ColumnTypeWire::Datetime => ColumnType::DateTime,
            ColumnTypeWire::Timestamp => ColumnType::Timestamp,
            ColumnTypeWire::Other => ColumnType::Other,
        }
    }
}

impl From<&ColumnType> for ColumnTypeWire {
    fn from(value: &ColumnType) -> Self {
        match value {
            ColumnType::Enum(values) => ColumnTypeWire::Enum {
                values: values.clone(),
            },
            ColumnType::Set(values) => ColumnTypeWire::Set {
                values: values.clone(),
            },
            ColumnType::Bit => ColumnTypeWire::Bit,
            ColumnType::String => ColumnTypeWire::String,
            ColumnType::Json => ColumnTypeWire::Json,
            ColumnType::DateTime => ColumnTypeWire::Datetime,
            ColumnType::Timestamp => ColumnTypeWire::Timestamp,
            ColumnType::Other => ColumnTypeWire::Other,
        }
    }
}

impl TryFrom<ValueWire> for RawValue {
    type Error = SyncError;

    fn try_from(value: ValueWire) -> Result<Self, Self::Error> {
        Ok(match value {
            ValueWire::Null => RawValue::Null,
            ValueWire::Int(value) => RawValue::Int(value),
            ValueWire::Uint(value) => RawValue::UInt(value),
            ValueWire::Float(value) => RawValue::Float(value),
            ValueWire::Decimal(value) => RawValue::Decimal(value),
            ValueWire::String(value) => RawValue::String(value),
            ValueWire::Bytes(value) => RawValue::Bytes(STANDARD.decode(value).map_err(|err| {
                sync_error!(
                    ErrorKind::SourceProtocolError,
                    "Invalid base64 in a bytes value",
                    err
                )
            })?),
        })
    }
}

impl From<&RawValue> for ValueWire {
    fn from(value: &RawValue) -> Self {
        match value {
            RawValue::Null => ValueWire::Null,
            RawValue::Int(value) => ValueWire::Int(*value),
            RawValue::UInt(value) => ValueWire::Uint(*value),
            RawValue::Float(value) => ValueWire::Float(*value),
            RawValue::Decimal(value) => ValueWire::Decimal(value.clone()),
            RawValue::String(value) => ValueWire::String(value.clone()),
            RawValue::Bytes(value) => ValueWire::Bytes(STANDARD.encode(value)),
        }
    }
}

impl TryFrom<EventWire> for ReplicationEvent {
    type Error = SyncError;

    fn try_from(event: EventWire) -> Result<Self, Self::Error> {
        Ok(match event {
            EventWire::Rotate { position } => ReplicationEvent::Rotate { position },
            EventWire::TableChanged {
                table,
                columns,
                primary_key,
            } => {
                let column_schemas = columns
                    .into_iter()
                    .map(|column| ColumnSchema::new(column.name, column.typ.into()))
                    .collect();

                ReplicationEvent::TableChanged {
                    schema: TableSchema::new(table, column_schemas, primary_key)?,
                }
            }
            EventWire::Rows {
                table,
                action,
                rows,
                position,
            } => {
                let rows = rows
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|value| value.map_or(Ok(RawValue::Null), RawValue::try_from))
                            .collect::<SyncResult<Vec<_>>>()
                            .map(RowImage::new)
                    })
                    .collect::<SyncResult<Vec<_>>>()?;

                ReplicationEvent::Rows {
                    table,
                    kind: action.parse::<ChangeKind>()?,
                    rows,
                    position,
                }
            }
            EventWire::Xid { position } => ReplicationEvent::TransactionBoundary { position },
            EventWire::PositionSynced { position } => ReplicationEvent::PositionSynced { position },
        })
    }
}

impl From<&ReplicationEvent> for EventWire {
    fn from(event: &ReplicationEvent) -> Self {
        match event {
            ReplicationEvent::Rotate { position } => EventWire::Rotate {
                position: position.clone(),
            },
            ReplicationEvent::TableChanged { schema } => EventWire::TableChanged {
                table: schema.name.clone(),
                columns: schema
                    .column_schemas
                    .iter()
                    .map(|column| ColumnWire {
                        name: column.name.clone(),
                        typ: (&column.typ).into(),
                    })
                    .collect(),
                primary_key: schema.primary_key().to_vec(),
            },
            ReplicationEvent::Rows {
                table,
                kind,
                rows,
                position,
            } => EventWire::Rows {
                table: table.clone(),
                action: kind.as_str().to_string(),
                rows: rows
                    .iter()
                    .map(|row| row.values().iter().map(|value| Some(value.into())).collect())
                    .collect(),
                position: position.clone(),
            },
            ReplicationEvent::TransactionBoundary { position } => EventWire::Xid {
                position: position.clone(),
            },
            ReplicationEvent::PositionSynced { position } => EventWire::PositionSynced {
                position: position.clone(),
            },
        }
    }
}

/// Parses one notification line.
pub fn decode_event(line: &str) -> SyncResult<ReplicationEvent> {
    let event = serde_json::from_str::<EventWire>(line).map_err(|err| {
        sync_error!(
            ErrorKind::SourceProtocolError,
            "Malformed replication notification",
            err.to_string(),
            source: err
        )
    })?;

    event.try_into()
}

/// Renders `event` as one notification line, without the trailing newline.
pub fn encode_event(event: &ReplicationEvent) -> SyncResult<String> {
    serde_json::to_string(&EventWire::from(event)).map_err(|err| {
        sync_error!(
            ErrorKind::SerializationError,
            "Failed to encode replication notification",
            err.to_string(),
            source: err
        )
    })
}

/// Replication source reading notifications from `reader` and writing acknowledgements to
/// `writer`.
#[derive(Debug)]
pub struct JsonLinesSource<R, W> {
    lines: Lines<R>,
    writer: W,
    line_number: usize,
}

impl<R, W> JsonLinesSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            line_number: 0,
        }
    }

    /// Consumes the source and returns the acknowledgement writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R, W> ReplicationSource for JsonLinesSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_event(&mut self) -> SyncResult<Option<ReplicationEvent>> {
        loop {
            let line = self.lines.next_line().await.map_err(|err| {
                sync_error!(
                    ErrorKind::SourceIoError,
                    "Failed to read from the replication client",
                    err.to_string(),
                    source: err
                )
            })?;

            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            trace!(line_number = self.line_number, "decoding notification");

            return decode_event(&line).map(Some).map_err(|err| {
                let detail = format!(
                    "line {}: {}",
                    self.line_number,
                    err.detail().unwrap_or_else(|| err.description())
                );
                sync_error!(err.kind(), "Invalid replication notification", detail, source: err)
            });
        }
    }

    async fn acknowledge(&mut self, position: &LogPosition) -> SyncResult<()> {
        let mut line = serde_json::to_string(&AckWire { ack: position })?;
        line.push('\n');

        let write = async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await
        };

        write.await.map_err(|err| {
            sync_error!(
                ErrorKind::SourceIoError,
                "Failed to acknowledge a position",
                format!("{position}: {err}"),
                source: err
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rows_with_every_value_shape() {
        let line = r#"{"type":"rows","table":{"schema":"shop","name":"orders"},"action":"update","rows":[[{"int":-1},{"uint":2},{"float":1.5},{"decimal":"9.99"},{"string":"x"},{"bytes":"AQ=="},"null",null]],"position":{"file":"mysql-bin.000002","offset":77}}"#;

        let event = decode_event(line).unwrap();
        assert_eq!(
            event,
            ReplicationEvent::Rows {
                table: TableName::new("shop", "orders"),
                kind: ChangeKind::Update,
                rows: vec![RowImage::new(vec![
                    RawValue::Int(-1),
                    RawValue::UInt(2),
                    RawValue::Float(1.5),
                    RawValue::Decimal("9.99".to_string()),
                    RawValue::from("x"),
                    RawValue::Bytes(vec![1]),
                    RawValue::Null,
                    RawValue::Null,
                ])],
                position: LogPosition::new("mysql-bin.000002", 77),
            }
        );
    }

    #[test]
    fn decodes_table_structure_changes() {
        let line = r#"{"type":"table_changed","table":{"schema":"shop","name":"orders"},"columns":[{"name":"id","type":"other"},{"name":"status","type":"enum","values":["new","paid"]},{"name":"geo","type":"geometry"}],"primary_key":[0]}"#;

        let ReplicationEvent::TableChanged { schema } = decode_event(line).unwrap() else {
            panic!("expected a table change");
        };
        assert_eq!(schema.primary_key(), &[0]);
        assert_eq!(
            schema.column_schemas[1].typ,
            ColumnType::Enum(vec!["new".to_string(), "paid".to_string()])
        );
        assert_eq!(schema.column_schemas[2].typ, ColumnType::Other);
    }

    #[test]
    fn unknown_action_is_a_protocol_error() {
        let line = r#"{"type":"rows","table":{"name":"orders"},"action":"truncate","rows":[],"position":{"file":"f","offset":1}}"#;
        let err = decode_event(line).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceProtocolError);
    }

    #[test]
    fn encoded_events_decode_back() {
        let event = ReplicationEvent::Rows {
            table: TableName::new("shop", "orders"),
            kind: ChangeKind::Delete,
            rows: vec![RowImage::new(vec![RawValue::Int(7), RawValue::Bytes(b"x".to_vec())])],
            position: LogPosition::new("mysql-bin.000001", 4),
        };

        assert_eq!(decode_event(&encode_event(&event).unwrap()).unwrap(), event);
    }

    #[tokio::test]
    async fn reads_lines_and_writes_acknowledgements() {
        let input = "\n{\"type\":\"xid\",\"position\":{\"file\":\"mysql-bin.000001\",\"offset\":9}}\n";
        let mut source = JsonLinesSource::new(input.as_bytes(), Vec::new());

        let event = source.next_event().await.unwrap().unwrap();
        let ReplicationEvent::TransactionBoundary { position } = event else {
            panic!("expected a transaction boundary");
        };
        source.acknowledge(&position).await.unwrap();
        assert!(source.next_event().await.unwrap().is_none());

        let written = String::from_utf8(source.into_writer()).unwrap();
        assert_eq!(
            written,
            "{\"ack\":{\"file\":\"mysql-bin.000001\",\"offset\":9}}\n"
        );
    }

    #[tokio::test]
    async fn malformed_lines_report_their_number() {
        let input = "{\"type\":\"rotate\",\"position\":{\"file\":\"b\",\"offset\":4}}\nnot json\n";
        let mut source = JsonLinesSource::new(input.as_bytes(), Vec::new());

        source.next_event().await.unwrap();
        let err = source.next_event().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceProtocolError);
        assert!(err.detail().unwrap().starts_with("line 2:"));
    }
}
