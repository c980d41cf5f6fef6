//! Drives change notifications from a replication source through the dispatcher.
//!
//! The pipeline is strictly sequential: a notification is processed to completion, including the
//! warehouse round trips, before the next one is read. Positions are acknowledged to the source
//! only at transaction boundaries and sync points, and never after a failure, so the last
//! acknowledged position is always a safe point to resume from.

use tracing::{debug, info};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::Warehouse;
use crate::error::{ErrorKind, SyncResult};
use crate::lookup::LookupClient;
use crate::replication::{DispatchOutcome, Dispatcher};
use crate::rules::TableFilter;
use crate::schema::SchemaCache;
use crate::source::ReplicationSource;
use crate::types::{ChangeEvent, LogPosition, ReplicationEvent};

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Notifications read from the source.
    pub notifications: u64,
    /// Row events handed to the dispatcher.
    pub dispatched_events: u64,
    /// Row events whose effective action was `none`.
    pub dropped_events: u64,
    /// Row events of tables outside the table filter.
    pub filtered_events: u64,
    /// Rows uploaded to the warehouse.
    pub rows_uploaded: u64,
    /// Delete statements run against the warehouse.
    pub rows_deleted: u64,
    /// Last position acknowledged to the source.
    pub last_acknowledged: Option<LogPosition>,
}

/// Sequential change-propagation pipeline.
#[derive(Debug)]
pub struct Pipeline<S, W, L> {
    source: S,
    filter: TableFilter,
    dispatcher: Dispatcher<W, L>,
    schema_cache: SchemaCache,
    shutdown_tx: ShutdownTx,
}

impl<S, W, L> Pipeline<S, W, L>
where
    S: ReplicationSource + Send,
    W: Warehouse + Clone + Send + Sync,
    L: LookupClient + Send + Sync,
{
    pub fn new(source: S, filter: TableFilter, dispatcher: Dispatcher<W, L>) -> Self {
        // The receiver is recreated from the sender when the pipeline runs.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            source,
            filter,
            dispatcher,
            schema_cache: SchemaCache::new(),
            shutdown_tx,
        }
    }

    /// Returns a handle that stops the pipeline before its next notification.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Processes notifications until the source ends, shutdown is requested, or an error occurs.
    ///
    /// The source's [`ReplicationSource::next_event`] must be cancel safe: it is abandoned when
    /// shutdown is requested while waiting for the next notification.
    pub async fn run(mut self) -> SyncResult<PipelineStats> {
        info!("starting change propagation pipeline");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut stats = PipelineStats::default();

        loop {
            if shutdown_rx.is_shutdown() {
                info!("shutdown requested, stopping pipeline");
                break;
            }

            let event = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => {
                    info!("shutdown requested, stopping pipeline");
                    break;
                }
                event = self.source.next_event() => event?,
            };

            let Some(event) = event else {
                info!("replication stream ended");
                break;
            };

            stats.notifications += 1;
            self.handle_event(event, &mut stats).await?;
        }

        info!(
            notifications = stats.notifications,
            rows_uploaded = stats.rows_uploaded,
            rows_deleted = stats.rows_deleted,
            "pipeline stopped"
        );

        Ok(stats)
    }

    async fn handle_event(
        &mut self,
        event: ReplicationEvent,
        stats: &mut PipelineStats,
    ) -> SyncResult<()> {
        match event {
            ReplicationEvent::Rotate { position } => {
                info!(%position, "replication log rotated");
            }
            ReplicationEvent::TableChanged { schema } => {
                debug!(
                    table = %schema.name,
                    columns = schema.column_schemas.len(),
                    "table structure changed"
                );
                self.schema_cache.add_table_schema(schema);
            }
            ReplicationEvent::Rows {
                table,
                kind,
                rows,
                position,
            } => {
                if !self.filter.includes(&table) {
                    debug!(%table, %position, "skipping change of a table outside the filter");
                    stats.filtered_events += 1;

                    return Ok(());
                }

                let Some(schema) = self.schema_cache.get_table_schema(&table) else {
                    bail!(
                        ErrorKind::MissingTableSchema,
                        "Row change for a table without metadata",
                        format!("no structure was reported for `{table}` before position {position}")
                    );
                };

                let outcome = self
                    .dispatcher
                    .dispatch(ChangeEvent {
                        table: schema,
                        kind,
                        rows,
                        position,
                    })
                    .await?;

                stats.dispatched_events += 1;
                match outcome {
                    DispatchOutcome::Skipped => stats.dropped_events += 1,
                    DispatchOutcome::Materialized { rows, .. } => stats.rows_uploaded += rows as u64,
                    DispatchOutcome::Deleted { rows, .. } => stats.rows_deleted += rows as u64,
                }
            }
            ReplicationEvent::TransactionBoundary { position }
            | ReplicationEvent::PositionSynced { position } => {
                self.source.acknowledge(&position).await?;
                debug!(%position, "acknowledged position");
                stats.last_acknowledged = Some(position);
            }
        }

        Ok(())
    }
}
