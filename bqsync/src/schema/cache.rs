use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{TableName, TableSchema};

/// Latest known metadata snapshot of every table seen on the stream.
///
/// Snapshots are shared with in-flight change events through [`Arc`] and are never mutated: a
/// structure change replaces the whole entry, so an event keeps the snapshot it was built with.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    table_schemas: HashMap<TableName, Arc<TableSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `table_schema`, replacing any previous snapshot of the same table.
    ///
    /// Returns the replaced snapshot, if any.
    pub fn add_table_schema(&mut self, table_schema: TableSchema) -> Option<Arc<TableSchema>> {
        self.table_schemas
            .insert(table_schema.name.clone(), Arc::new(table_schema))
    }

    /// Returns the current snapshot of `table`.
    pub fn get_table_schema(&self, table: &TableName) -> Option<Arc<TableSchema>> {
        self.table_schemas.get(table).cloned()
    }

    pub fn len(&self) -> usize {
        self.table_schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, ColumnType};

    fn schema(columns: &[&str]) -> TableSchema {
        TableSchema::new(
            TableName::new("shop", "orders"),
            columns
                .iter()
                .map(|name| ColumnSchema::new(*name, ColumnType::Other))
                .collect(),
            vec![0],
        )
        .unwrap()
    }

    #[test]
    fn structure_changes_replace_snapshots_wholesale() {
        let mut cache = SchemaCache::new();
        cache.add_table_schema(schema(&["id"]));
        let held = cache
            .get_table_schema(&TableName::new("shop", "orders"))
            .unwrap();

        let replaced = cache.add_table_schema(schema(&["id", "total"])).unwrap();
        let current = cache
            .get_table_schema(&TableName::new("shop", "orders"))
            .unwrap();

        assert!(Arc::ptr_eq(&held, &replaced));
        assert_eq!(held.column_schemas.len(), 1);
        assert_eq!(current.column_schemas.len(), 2);
        assert_eq!(cache.len(), 1);
    }
}
