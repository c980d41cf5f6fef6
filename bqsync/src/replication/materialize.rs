use tracing::debug;

use crate::bail;
use crate::conversions::{ColumnCodec, normalize_lookup_value};
use crate::destination::Warehouse;
use crate::error::{ErrorKind, SyncResult};
use crate::lookup::{LookupClient, QueryParameter};
use crate::replication::RowSelection;
use crate::rules::Action;
use crate::types::{Cell, ChangeEvent, DedupKey, RowImage, TargetRow};

/// Builds warehouse rows from change events and uploads them.
#[derive(Debug)]
pub struct Materializer<W, L> {
    warehouse: W,
    lookup: L,
    codec: ColumnCodec,
}

impl<W, L> Materializer<W, L>
where
    W: Warehouse + Send + Sync,
    L: LookupClient + Send + Sync,
{
    pub fn new(warehouse: W, lookup: L, codec: ColumnCodec) -> Self {
        Self {
            warehouse,
            lookup,
            codec,
        }
    }

    /// Uploads the selected row images of `event` as one batch and returns the number of rows
    /// uploaded.
    ///
    /// Without a rewrite query each image becomes one row keyed by the source column names. With
    /// one, each image is replaced by the rows the query returns, which may be none. Every row of
    /// the batch shares the deduplication key of the event's log position. No upload is issued
    /// when the batch is empty.
    pub async fn materialize(
        &self,
        action: &Action,
        event: &ChangeEvent,
        selection: RowSelection,
    ) -> SyncResult<usize> {
        let table = action.target_table(&event.table.name.name);
        let dedup_key = DedupKey::from(&event.position);
        let mut rows = Vec::new();

        for image in selection.select(&event.rows) {
            let values = match action.rewrite_query() {
                Some(query) => self.rewrite(query, event, image).await?,
                None => vec![self.map_direct(event, image)?],
            };

            for values in values {
                rows.push(TargetRow {
                    values,
                    dedup_key: dedup_key.clone(),
                    ordinal: rows.len(),
                });
            }
        }

        if rows.is_empty() {
            debug!(table, position = %event.position, "no rows to upload");
            return Ok(0);
        }

        let count = rows.len();
        self.warehouse.insert_rows(table, rows).await?;

        debug!(
            table,
            rows = count,
            position = %event.position,
            "uploaded rows"
        );

        Ok(count)
    }

    fn map_direct(
        &self,
        event: &ChangeEvent,
        image: &RowImage,
    ) -> SyncResult<Vec<(String, Cell)>> {
        let columns = &event.table.column_schemas;
        let cells = self.codec.decode_row(columns, image.values())?;

        Ok(columns
            .iter()
            .map(|column| column.name.clone())
            .zip(cells)
            .collect())
    }

    async fn rewrite(
        &self,
        query: &str,
        event: &ChangeEvent,
        image: &RowImage,
    ) -> SyncResult<Vec<Vec<(String, Cell)>>> {
        let columns = &event.table.column_schemas;
        let parameters = columns
            .iter()
            .zip(self.codec.decode_row(columns, image.values())?)
            .map(|(column, value)| QueryParameter::new(column.name.clone(), value))
            .collect::<Vec<_>>();

        let result = self.lookup.query(query, &parameters).await?;

        result
            .rows
            .into_iter()
            .map(|row| {
                if row.len() != result.columns.len() {
                    bail!(
                        ErrorKind::LookupQueryFailed,
                        "Lookup row does not match the result columns",
                        format!(
                            "the lookup query returned {} columns but a row with {} values",
                            result.columns.len(),
                            row.len()
                        )
                    );
                }

                Ok(result
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(normalize_lookup_value))
                    .collect())
            })
            .collect()
    }
}
