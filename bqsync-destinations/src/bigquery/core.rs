use bqsync::destination::Warehouse;
use bqsync::error::SyncResult;
use bqsync::types::{DeletePredicate, TargetRow};
use tracing::debug;

use crate::bigquery::client::{BigQueryClient, BigQueryDatasetId, BigQueryProjectId};

/// A BigQuery warehouse implementing the [`Warehouse`] trait.
///
/// All tables live in a single dataset; the table id is the target table name of the change,
/// either the source table or the override configured on the rule's action. Tables are expected
/// to exist with columns matching the source tables.
#[derive(Debug, Clone)]
pub struct BigQueryWarehouse {
    client: BigQueryClient,
    dataset_id: BigQueryDatasetId,
}

impl BigQueryWarehouse {
    /// Creates a new [`BigQueryWarehouse`] using a service account key file path.
    pub async fn new_with_key_path(
        project_id: BigQueryProjectId,
        dataset_id: BigQueryDatasetId,
        sa_key_path: &str,
    ) -> SyncResult<Self> {
        let client = BigQueryClient::new_with_key_path(project_id, sa_key_path).await?;

        Ok(Self::new(client, dataset_id))
    }

    /// Creates a new [`BigQueryWarehouse`] using a service account key JSON string.
    ///
    /// Similar to [`BigQueryWarehouse::new_with_key_path`] but accepts the key content directly,
    /// which is convenient when the key is injected through the environment.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        dataset_id: BigQueryDatasetId,
        sa_key: &str,
    ) -> SyncResult<Self> {
        let client = BigQueryClient::new_with_key(project_id, sa_key).await?;

        Ok(Self::new(client, dataset_id))
    }

    /// Creates a new [`BigQueryWarehouse`] using Application Default Credentials.
    pub async fn new_with_adc(
        project_id: BigQueryProjectId,
        dataset_id: BigQueryDatasetId,
    ) -> SyncResult<Self> {
        let client = BigQueryClient::new_with_adc(project_id).await?;

        Ok(Self::new(client, dataset_id))
    }

    /// Creates a new [`BigQueryWarehouse`] from an existing client.
    pub fn new(client: BigQueryClient, dataset_id: BigQueryDatasetId) -> Self {
        Self { client, dataset_id }
    }
}

impl Warehouse for BigQueryWarehouse {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn insert_rows(&self, table: &str, rows: Vec<TargetRow>) -> SyncResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        debug!(
            project_id = self.client.project_id(),
            dataset_id = %self.dataset_id,
            table,
            rows = rows.len(),
            "streaming rows into BigQuery"
        );

        self.client.insert_all(&self.dataset_id, table, &rows).await
    }

    async fn delete_rows(&self, predicate: DeletePredicate) -> SyncResult<()> {
        debug!(
            project_id = self.client.project_id(),
            dataset_id = %self.dataset_id,
            table = %predicate.table,
            columns = predicate.columns.len(),
            "deleting rows from BigQuery"
        );

        self.client.delete(&self.dataset_id, &predicate).await
    }
}
