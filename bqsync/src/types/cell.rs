use crate::types::RawValue;

/// A canonical value that the warehouse can store directly.
///
/// Codec rules produce [`Cell::I64`] or [`Cell::String`]; every other variant is a value passed
/// through from the replication stream unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    I64(i64),
    U64(u64),
    F64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
}

impl Cell {
    /// Returns `true` if the cell is [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<RawValue> for Cell {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::Null => Cell::Null,
            RawValue::Int(value) => Cell::I64(value),
            RawValue::UInt(value) => Cell::U64(value),
            RawValue::Float(value) => Cell::F64(value),
            RawValue::Decimal(value) => Cell::Numeric(value),
            RawValue::String(value) => Cell::String(value),
            RawValue::Bytes(value) => Cell::Bytes(value),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}
