use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::Warehouse;
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::types::{DeletePredicate, TargetRow};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Vec<TargetRow>>,
    seen_insert_ids: HashSet<(String, String)>,
    inserts: Vec<(String, Vec<TargetRow>)>,
    deletes: Vec<DeletePredicate>,
    fail_inserts: Option<ErrorKind>,
    fail_deletes: Option<ErrorKind>,
}

/// In-memory warehouse for dry runs and tests.
///
/// It mimics the warehouse's best-effort deduplication by discarding rows whose insert id was
/// already stored for the same table, and applies delete predicates to the stored rows. Every
/// call is also recorded so tests can assert on what was sent.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rows currently stored in `table`.
    pub async fn table_rows(&self, table: &str) -> Vec<TargetRow> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    /// Returns every upload call, in order, with the rows as they were submitted.
    pub async fn inserts(&self) -> Vec<(String, Vec<TargetRow>)> {
        let inner = self.inner.lock().await;
        inner.inserts.clone()
    }

    /// Returns every delete call, in order.
    pub async fn deletes(&self) -> Vec<DeletePredicate> {
        let inner = self.inner.lock().await;
        inner.deletes.clone()
    }

    /// Returns the total number of upload and delete calls received.
    pub async fn call_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.inserts.len() + inner.deletes.len()
    }

    /// Makes every following upload fail with `kind`.
    pub async fn fail_inserts_with(&self, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.fail_inserts = Some(kind);
    }

    /// Makes every following delete fail with `kind`.
    pub async fn fail_deletes_with(&self, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner.fail_deletes = Some(kind);
    }
}

impl Warehouse for MemoryWarehouse {
    fn name() -> &'static str {
        "memory"
    }

    async fn insert_rows(&self, table: &str, rows: Vec<TargetRow>) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some(kind) = inner.fail_inserts {
            return Err(sync_error!(
                kind,
                "Injected upload failure",
                format!("upload of {} rows to `{table}` failed", rows.len())
            ));
        }

        info!(table, rows = rows.len(), "uploading rows");
        inner.inserts.push((table.to_string(), rows.clone()));

        for row in rows {
            if inner
                .seen_insert_ids
                .insert((table.to_string(), row.insert_id()))
            {
                inner.tables.entry(table.to_string()).or_default().push(row);
            }
        }

        Ok(())
    }

    async fn delete_rows(&self, predicate: DeletePredicate) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some(kind) = inner.fail_deletes {
            return Err(sync_error!(
                kind,
                "Injected delete failure",
                format!("delete from `{}` failed", predicate.table)
            ));
        }

        info!(table = %predicate.table, columns = predicate.columns.len(), "deleting rows");

        if let Some(rows) = inner.tables.get_mut(&predicate.table) {
            rows.retain(|row| {
                !predicate
                    .columns
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(value))
            });
        }
        inner.deletes.push(predicate);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, DedupKey, LogPosition};

    fn row(id: i64, position: &LogPosition, ordinal: usize) -> TargetRow {
        TargetRow {
            values: vec![("id".to_string(), Cell::I64(id))],
            dedup_key: DedupKey::from(position),
            ordinal,
        }
    }

    #[tokio::test]
    async fn discards_redelivered_rows() {
        let warehouse = MemoryWarehouse::new();
        let position = LogPosition::new("mysql-bin.000001", 120);

        warehouse
            .insert_rows("orders", vec![row(1, &position, 0), row(2, &position, 1)])
            .await
            .unwrap();
        warehouse
            .insert_rows("orders", vec![row(1, &position, 0), row(2, &position, 1)])
            .await
            .unwrap();

        assert_eq!(warehouse.table_rows("orders").await.len(), 2);
        assert_eq!(warehouse.inserts().await.len(), 2);
    }

    #[tokio::test]
    async fn deletes_matching_rows() {
        let warehouse = MemoryWarehouse::new();
        let position = LogPosition::new("mysql-bin.000001", 120);
        warehouse
            .insert_rows("orders", vec![row(1, &position, 0), row(2, &position, 1)])
            .await
            .unwrap();

        warehouse
            .delete_rows(DeletePredicate {
                table: "orders".to_string(),
                columns: vec![("id".to_string(), Cell::I64(2))],
            })
            .await
            .unwrap();

        let rows = warehouse.table_rows("orders").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Cell::I64(1)));
    }

    #[tokio::test]
    async fn injected_failures_are_returned() {
        let warehouse = MemoryWarehouse::new();
        warehouse
            .fail_inserts_with(ErrorKind::PartialBatchFailure)
            .await;

        let err = warehouse.insert_rows("orders", vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialBatchFailure);
        assert!(warehouse.inserts().await.is_empty());
    }
}
