use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// Declared type of a source column, as far as value canonicalization is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// `ENUM` column with its labels in declaration order.
    Enum(Vec<String>),
    /// `SET` column with its members in declaration order.
    Set(Vec<String>),
    Bit,
    /// Character and binary string columns.
    String,
    Json,
    DateTime,
    Timestamp,
    /// Any other column type; values pass through unchanged.
    Other,
}

impl ColumnType {
    /// Short upper case tag of the type, used in logs and error details.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::Enum(_) => "ENUM",
            ColumnType::Set(_) => "SET",
            ColumnType::Bit => "BIT",
            ColumnType::String => "STRING",
            ColumnType::Json => "JSON",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Other => "OTHER",
        }
    }
}

/// Describes a single column of a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}

/// Fully qualified name of a source table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// Database the table lives in. May be empty when the source does not report it.
    #[serde(default)]
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns `schema.name`, or just the name when the schema is unknown.
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}

/// Snapshot of a source table's metadata.
///
/// A snapshot is immutable. When the replication client reports a structure change the cached
/// snapshot is replaced wholesale by a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
    /// Indices into `column_schemas` of the primary key columns, in key order.
    primary_key: Vec<usize>,
}

impl TableSchema {
    /// Creates a table schema, checking that every primary key index refers to a column.
    pub fn new(
        name: TableName,
        column_schemas: Vec<ColumnSchema>,
        primary_key: Vec<usize>,
    ) -> SyncResult<Self> {
        if let Some(index) = primary_key
            .iter()
            .find(|index| **index >= column_schemas.len())
        {
            bail!(
                ErrorKind::InvalidData,
                "Primary key index out of range",
                format!(
                    "table `{name}` has {} columns but primary key index {index} was reported",
                    column_schemas.len()
                )
            );
        }

        Ok(Self {
            name,
            column_schemas,
            primary_key,
        })
    }

    /// Returns `true` if the table has at least one primary key column.
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Returns the indices of the primary key columns, in key order.
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Returns the primary key columns together with their index in the row image.
    pub fn primary_key_columns(&self) -> SyncResult<Vec<(usize, &ColumnSchema)>> {
        self.primary_key
            .iter()
            .map(|index| {
                let column = self.column_schemas.get(*index).ok_or_else(|| {
                    sync_error!(
                        ErrorKind::InvalidData,
                        "Primary key index out of range",
                        format!(
                            "table `{}` has {} columns but primary key index {index} was reported",
                            self.name,
                            self.column_schemas.len()
                        )
                    )
                })?;

                Ok((*index, column))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_primary_key_outside_the_columns() {
        let err = TableSchema::new(
            TableName::new("shop", "orders"),
            vec![ColumnSchema::new("id", ColumnType::Other)],
            vec![1],
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn displays_qualified_names() {
        assert_eq!(TableName::new("shop", "orders").to_string(), "shop.orders");
        assert_eq!(TableName::new("", "orders").to_string(), "orders");
    }

    #[test]
    fn primary_key_columns_report_out_of_range_indices() {
        let mut schema = TableSchema::new(
            TableName::new("shop", "orders"),
            vec![
                ColumnSchema::new("id", ColumnType::Other),
                ColumnSchema::new("name", ColumnType::Other),
            ],
            vec![1],
        )
        .unwrap();

        let columns = schema.primary_key_columns().unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].0, 1);
        assert_eq!(columns[0].1.name, "name");

        schema.column_schemas.truncate(1);
        assert_eq!(
            schema.primary_key_columns().unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }
}
