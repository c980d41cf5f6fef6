use std::future::Future;

use crate::error::SyncResult;
use crate::types::{DeletePredicate, TargetRow};

/// Trait for analytics warehouses receiving materialized changes.
///
/// Both operations are awaited to completion before the next change is processed, which is what
/// keeps dependent mutations of the same row in log order. Implementations must not retry
/// partially applied batches on their own: any failure is reported to the caller, which halts
/// replication.
pub trait Warehouse {
    /// Returns the name of the warehouse.
    fn name() -> &'static str;

    /// Uploads `rows` to `table` as a single batch.
    ///
    /// Every row carries a deduplication token ([`TargetRow::insert_id`]); rows whose token was
    /// already uploaded may be discarded by the warehouse. A batch that is rejected in part must
    /// fail as a whole.
    fn insert_rows(
        &self,
        table: &str,
        rows: Vec<TargetRow>,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes the rows matching `predicate` and waits for the statement to complete.
    fn delete_rows(&self, predicate: DeletePredicate) -> impl Future<Output = SyncResult<()>> + Send;
}
