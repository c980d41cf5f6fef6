use tracing::debug;

use crate::bail;
use crate::conversions::ColumnCodec;
use crate::destination::Warehouse;
use crate::error::{ErrorKind, SyncResult};
use crate::replication::RowSelection;
use crate::rules::Action;
use crate::sync_error;
use crate::types::{ChangeEvent, DeletePredicate};

/// Deletes the warehouse rows matching the primary key of change events.
#[derive(Debug)]
pub struct Deleter<W> {
    warehouse: W,
    codec: ColumnCodec,
}

impl<W> Deleter<W>
where
    W: Warehouse + Send + Sync,
{
    pub fn new(warehouse: W, codec: ColumnCodec) -> Self {
        Self { warehouse, codec }
    }

    /// Issues one delete per selected row image and returns the number of deletes run.
    ///
    /// Deletes run one after the other; the first failure aborts the remaining ones.
    pub async fn delete(
        &self,
        action: &Action,
        event: &ChangeEvent,
        selection: RowSelection,
    ) -> SyncResult<usize> {
        let table = action.target_table(&event.table.name.name);
        let mut count = 0;

        for image in selection.select(&event.rows) {
            if !event.table.has_primary_key() {
                bail!(
                    ErrorKind::MissingPrimaryKey,
                    "Cannot delete rows of a table without primary key",
                    format!("table `{}` has no primary key", event.table.name)
                );
            }

            let columns = event
                .table
                .primary_key_columns()?
                .into_iter()
                .map(|(index, column)| {
                    let value = image.values().get(index).cloned().ok_or_else(|| {
                        sync_error!(
                            ErrorKind::InvalidData,
                            "Row image is missing a primary key column",
                            format!("column `{}` of `{}`", column.name, event.table.name)
                        )
                    })?;

                    Ok((column.name.clone(), self.codec.decode(column, value)?))
                })
                .collect::<SyncResult<Vec<_>>>()?;

            self.warehouse
                .delete_rows(DeletePredicate {
                    table: table.to_string(),
                    columns,
                })
                .await?;
            count += 1;
        }

        debug!(
            table,
            rows = count,
            position = %event.position,
            "deleted rows"
        );

        Ok(count)
    }
}
