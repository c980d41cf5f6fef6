use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, SecondsFormat, TimeZone};
use tracing::warn;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::sync_error;
use crate::types::{Cell, ColumnSchema, ColumnType, RawValue};

/// Text layout of `DATETIME` and `TIMESTAMP` values in the source, with optional fraction.
const SOURCE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Time zone in which the source writes `DATETIME`/`TIMESTAMP` text values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceTimezone {
    /// Time zone of the host running the replicator.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl FromStr for SourceTimezone {
    type Err = SyncError;

    /// Parses `local` or a fixed offset such as `+02:00`, `-0530` or `Z`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("local") {
            return Ok(SourceTimezone::Local);
        }
        if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
            return Ok(SourceTimezone::Fixed(FixedOffset::east_opt(0).ok_or_else(
                || sync_error!(ErrorKind::InvalidState, "UTC offset is not representable"),
            )?));
        }

        value.parse::<FixedOffset>().map(SourceTimezone::Fixed).map_err(|err| {
            sync_error!(
                ErrorKind::ConfigError,
                "Invalid source time zone",
                format!("`{value}` is neither `local` nor a UTC offset: {err}")
            )
        })
    }
}

/// Translates raw column values into canonical warehouse values.
///
/// Decoding depends only on the column's declared type and the shape of the raw value. Every
/// type except `JSON` is decodable; the only other failure is an `ENUM` index outside the
/// column's labels.
#[derive(Debug, Clone, Default)]
pub struct ColumnCodec {
    timezone: SourceTimezone,
}

impl ColumnCodec {
    pub fn new(timezone: SourceTimezone) -> Self {
        Self { timezone }
    }

    /// Decodes `value` according to the declared type of `column`.
    pub fn decode(&self, column: &ColumnSchema, value: RawValue) -> SyncResult<Cell> {
        if let ColumnType::Json = column.typ {
            bail!(
                ErrorKind::UnsupportedColumnType,
                "JSON columns are not supported",
                format!("column `{}` is declared as JSON", column.name)
            );
        }

        if value.is_null() {
            return Ok(Cell::Null);
        }

        match &column.typ {
            ColumnType::Enum(labels) => decode_enum(column, labels, value),
            ColumnType::Set(members) => Ok(decode_set(members, value)),
            ColumnType::Bit => Ok(decode_bit(value)),
            ColumnType::String => Ok(match value {
                RawValue::Bytes(bytes) => Cell::String(bytes_to_text(bytes)),
                other => Cell::from(other),
            }),
            ColumnType::DateTime | ColumnType::Timestamp => Ok(self.decode_datetime(column, value)),
            ColumnType::Json | ColumnType::Other => Ok(Cell::from(value)),
        }
    }

    /// Decodes every value of a row image against the table columns, in column order.
    pub fn decode_row(
        &self,
        columns: &[ColumnSchema],
        values: &[RawValue],
    ) -> SyncResult<Vec<Cell>> {
        columns
            .iter()
            .zip(values)
            .map(|(column, value)| self.decode(column, value.clone()))
            .collect()
    }

    fn decode_datetime(&self, column: &ColumnSchema, value: RawValue) -> Cell {
        let text = match value {
            RawValue::String(text) => text,
            other => return Cell::from(other),
        };

        match self.parse_datetime(&text) {
            Some(timestamp) => Cell::String(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => {
                warn!(
                    column = %column.name,
                    value = %text,
                    "could not parse {} value, storing NULL instead",
                    column.typ.tag()
                );

                Cell::Null
            }
        }
    }

    fn parse_datetime(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let naive = NaiveDateTime::parse_from_str(text, SOURCE_DATETIME_FORMAT).ok()?;

        match self.timezone {
            SourceTimezone::Local => earliest(Local.from_local_datetime(&naive))
                .map(|timestamp| timestamp.fixed_offset()),
            SourceTimezone::Fixed(offset) => earliest(offset.from_local_datetime(&naive)),
        }
    }
}

/// Picks the earlier instant of an ambiguous local time; non-existent local times yield `None`.
fn earliest<T>(result: LocalResult<T>) -> Option<T> {
    match result {
        LocalResult::Single(timestamp) => Some(timestamp),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}

fn decode_enum(column: &ColumnSchema, labels: &[String], value: RawValue) -> SyncResult<Cell> {
    match value {
        RawValue::Int(_) | RawValue::UInt(_) => {
            let label = value
                .as_index()
                .and_then(|index| index.checked_sub(1))
                .and_then(|position| usize::try_from(position).ok())
                .and_then(|position| labels.get(position));

            match label {
                Some(label) => Ok(Cell::String(label.clone())),
                None => bail!(
                    ErrorKind::ValueDecodingError,
                    "Enum index out of range",
                    format!(
                        "column `{}` has {} labels but index {value} was received",
                        column.name,
                        labels.len()
                    )
                ),
            }
        }
        other => Ok(Cell::from(other)),
    }
}

fn decode_set(members: &[String], value: RawValue) -> Cell {
    let mask = match value {
        RawValue::Int(mask) => mask as u64,
        RawValue::UInt(mask) => mask,
        other => return Cell::from(other),
    };

    let selected = members
        .iter()
        .enumerate()
        .filter(|(bit, _)| *bit < u64::BITS as usize && mask & (1 << bit) != 0)
        .map(|(_, member)| member.as_str())
        .collect::<Vec<_>>();

    Cell::String(selected.join(","))
}

fn decode_bit(value: RawValue) -> Cell {
    match value.as_bytes() {
        Some(bytes) if bytes == [0x01] => Cell::I64(1),
        Some(_) => Cell::I64(0),
        None => Cell::from(value),
    }
}

fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Normalizes a value returned by a lookup query: byte sequences become text, everything else
/// passes through unchanged.
pub fn normalize_lookup_value(value: RawValue) -> Cell {
    match value {
        RawValue::Bytes(bytes) => Cell::String(bytes_to_text(bytes)),
        other => Cell::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> ColumnCodec {
        ColumnCodec::new(SourceTimezone::Fixed(
            FixedOffset::east_opt(2 * 3600).unwrap(),
        ))
    }

    fn column(typ: ColumnType) -> ColumnSchema {
        ColumnSchema::new("c", typ)
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn enum_index_selects_label() {
        let column = column(ColumnType::Enum(labels(&["new", "paid", "shipped"])));

        for (index, label) in [(1, "new"), (2, "paid"), (3, "shipped")] {
            assert_eq!(
                codec().decode(&column, RawValue::Int(index)).unwrap(),
                Cell::String(label.to_string())
            );
        }
        assert_eq!(
            codec().decode(&column, RawValue::UInt(2)).unwrap(),
            Cell::from("paid")
        );
    }

    #[test]
    fn enum_index_out_of_range_fails() {
        let column = column(ColumnType::Enum(labels(&["new", "paid", "shipped"])));

        for index in [0, 4, -1] {
            let err = codec().decode(&column, RawValue::Int(index)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueDecodingError);
        }
    }

    #[test]
    fn enum_label_passes_through() {
        let column = column(ColumnType::Enum(labels(&["new", "paid"])));
        assert_eq!(
            codec().decode(&column, RawValue::from("paid")).unwrap(),
            Cell::from("paid")
        );
    }

    #[test]
    fn set_bitmask_joins_members_low_to_high() {
        let column = column(ColumnType::Set(labels(&["a", "b", "c"])));

        assert_eq!(
            codec().decode(&column, RawValue::Int(0b101)).unwrap(),
            Cell::from("a,c")
        );
        assert_eq!(
            codec().decode(&column, RawValue::Int(0)).unwrap(),
            Cell::from("")
        );
        assert_eq!(
            codec().decode(&column, RawValue::from("b,c")).unwrap(),
            Cell::from("b,c")
        );
    }

    #[test]
    fn bit_strings_become_integers() {
        let column = column(ColumnType::Bit);

        assert_eq!(
            codec().decode(&column, RawValue::from("\x01")).unwrap(),
            Cell::I64(1)
        );
        assert_eq!(
            codec().decode(&column, RawValue::from("\x00")).unwrap(),
            Cell::I64(0)
        );
        assert_eq!(
            codec().decode(&column, RawValue::Bytes(vec![1])).unwrap(),
            Cell::I64(1)
        );
        assert_eq!(
            codec().decode(&column, RawValue::Int(1)).unwrap(),
            Cell::I64(1)
        );
    }

    #[test]
    fn string_bytes_are_decoded_as_text() {
        let column = column(ColumnType::String);

        assert_eq!(
            codec()
                .decode(&column, RawValue::Bytes(b"hello".to_vec()))
                .unwrap(),
            Cell::from("hello")
        );
        assert_eq!(
            codec()
                .decode(&column, RawValue::Bytes(vec![0x66, 0xff]))
                .unwrap(),
            Cell::from("f\u{fffd}")
        );
        assert_eq!(
            codec().decode(&column, RawValue::Int(5)).unwrap(),
            Cell::I64(5)
        );
    }

    #[test]
    fn datetime_is_reemitted_with_offset() {
        let column = column(ColumnType::DateTime);

        assert_eq!(
            codec()
                .decode(&column, RawValue::from("2024-03-01 10:20:30"))
                .unwrap(),
            Cell::from("2024-03-01T10:20:30+02:00")
        );
        assert_eq!(
            codec()
                .decode(&column, RawValue::from("2024-03-01 10:20:30.250"))
                .unwrap(),
            Cell::from("2024-03-01T10:20:30+02:00")
        );
    }

    #[test]
    fn unparsable_datetime_becomes_null() {
        let column = column(ColumnType::Timestamp);

        assert_eq!(
            codec()
                .decode(&column, RawValue::from("0000-00-00 00:00:00"))
                .unwrap(),
            Cell::Null
        );
    }

    #[test]
    fn json_is_unsupported_even_when_null() {
        let column = column(ColumnType::Json);

        for value in [RawValue::Null, RawValue::from("{}")] {
            let err = codec().decode(&column, value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedColumnType);
        }
    }

    #[test]
    fn null_and_other_values_pass_through() {
        let enum_column = column(ColumnType::Enum(labels(&["a"])));
        assert_eq!(codec().decode(&enum_column, RawValue::Null).unwrap(), Cell::Null);

        let other = column(ColumnType::Other);
        assert_eq!(
            codec()
                .decode(&other, RawValue::Decimal("12.50".to_string()))
                .unwrap(),
            Cell::Numeric("12.50".to_string())
        );
    }

    #[test]
    fn lookup_values_turn_bytes_into_text() {
        assert_eq!(
            normalize_lookup_value(RawValue::Bytes(b"abc".to_vec())),
            Cell::from("abc")
        );
        assert_eq!(normalize_lookup_value(RawValue::Int(3)), Cell::I64(3));
    }

    #[test]
    fn parses_time_zones() {
        assert_eq!(
            "local".parse::<SourceTimezone>().unwrap(),
            SourceTimezone::Local
        );
        assert_eq!(
            "+02:00".parse::<SourceTimezone>().unwrap(),
            SourceTimezone::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
        assert_eq!(
            "Mars/Olympus".parse::<SourceTimezone>().unwrap_err().kind(),
            ErrorKind::ConfigError
        );
    }

    #[test]
    fn decode_row_stops_at_the_first_failing_column() {
        let columns = [
            ColumnSchema::new("status", ColumnType::Enum(labels(&["new", "paid"]))),
            ColumnSchema::new("payload", ColumnType::Json),
        ];

        assert_eq!(
            codec().decode_row(&columns[..1], &[RawValue::Int(2)]).unwrap(),
            vec![Cell::from("paid")]
        );
        assert_eq!(
            codec()
                .decode_row(&columns, &[RawValue::Int(2), RawValue::Null])
                .unwrap_err()
                .kind(),
            ErrorKind::UnsupportedColumnType
        );
    }
}
