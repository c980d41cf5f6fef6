use std::fmt;

/// A column value as decoded by the replication client, before canonicalization.
///
/// The same logical value can arrive with different shapes depending on whether it comes from a
/// full-table snapshot or from an incremental log entry. For example an `ENUM` value is a label
/// string in the former and a one-based index in the latter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact decimal kept in its textual form.
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
}

impl RawValue {
    /// Returns `true` if the value is [`RawValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Returns the value as a non-negative integer when it has an integer shape.
    pub fn as_index(&self) -> Option<u64> {
        match self {
            RawValue::Int(value) => u64::try_from(*value).ok(),
            RawValue::UInt(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the byte content of string and byte shapes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RawValue::String(value) => Some(value.as_bytes()),
            RawValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Short name of the value shape, used in error details.
    pub fn shape(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Int(_) => "int",
            RawValue::UInt(_) => "uint",
            RawValue::Float(_) => "float",
            RawValue::Decimal(_) => "decimal",
            RawValue::String(_) => "string",
            RawValue::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("NULL"),
            RawValue::Int(value) => write!(f, "{value}"),
            RawValue::UInt(value) => write!(f, "{value}"),
            RawValue::Float(value) => write!(f, "{value}"),
            RawValue::Decimal(value) | RawValue::String(value) => write!(f, "{value:?}"),
            RawValue::Bytes(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<u64> for RawValue {
    fn from(value: u64) -> Self {
        RawValue::UInt(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Bytes(value)
    }
}

impl<T> From<Option<T>> for RawValue
where
    T: Into<RawValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}
