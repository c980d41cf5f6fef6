use std::fmt;
use std::time::Duration;

use bqsync::error::{ErrorKind, SyncError, SyncResult};
use bqsync::types::{DeletePredicate, TargetRow};
use bqsync::{bail, sync_error};
use gcp_bigquery_client::Client;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use tokio::time::sleep;
use tracing::debug;

use crate::bigquery::encoding::{build_delete_statement, target_row_to_json};

/// Project identifier in BigQuery.
pub type BigQueryProjectId = String;
/// Dataset identifier in BigQuery.
pub type BigQueryDatasetId = String;
/// Table identifier in BigQuery.
pub type BigQueryTableId = String;

/// Maximum time a query request waits server side before returning an incomplete job.
const QUERY_TIMEOUT_MS: i32 = 10_000;
/// Delay between polls of a query job that has not completed yet.
const QUERY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Converts BigQuery errors to sync errors with appropriate classification.
fn bq_error_to_sync_error(err: BQError) -> SyncError {
    let (kind, description) = match &err {
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::InvalidApplicationDefaultCredentialsAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery application default credentials",
        ),
        BQError::AuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication error",
        ),
        BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery OAuth authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication token missing",
        ),
        BQError::RequestError(_) => (
            ErrorKind::DestinationConnectionFailed,
            "BigQuery request failed",
        ),
        BQError::ResponseError { .. } => {
            (ErrorKind::DestinationQueryFailed, "BigQuery response error")
        }
        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),
        _ => (ErrorKind::DestinationError, "BigQuery client error"),
    };

    sync_error!(kind, description, err.to_string(), source: err)
}

/// Client for the BigQuery REST APIs used by the warehouse.
///
/// Rows are streamed with `tabledata.insertAll`, which deduplicates on the per-row `insertId` on a
/// best-effort basis, and deletes run as parameterised DML jobs.
#[derive(Clone)]
pub struct BigQueryClient {
    project_id: BigQueryProjectId,
    client: Client,
}

impl BigQueryClient {
    /// Creates a new [`BigQueryClient`] from a service account key file.
    pub async fn new_with_key_path(
        project_id: BigQueryProjectId,
        sa_key_file: &str,
    ) -> SyncResult<BigQueryClient> {
        let client = Client::from_service_account_key_file(sa_key_file)
            .await
            .map_err(bq_error_to_sync_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Creates a new [`BigQueryClient`] from a service account key JSON string.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        sa_key: &str,
    ) -> SyncResult<BigQueryClient> {
        let sa_key = parse_service_account_key(sa_key).map_err(|err| {
            sync_error!(
                ErrorKind::AuthenticationError,
                "Invalid BigQuery service account key",
                err.to_string(),
                source: err
            )
        })?;
        let client = Client::from_service_account_key(sa_key, false)
            .await
            .map_err(bq_error_to_sync_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Creates a new [`BigQueryClient`] using Application Default Credentials.
    pub async fn new_with_adc(project_id: BigQueryProjectId) -> SyncResult<BigQueryClient> {
        let client = Client::from_application_default_credentials()
            .await
            .map_err(bq_error_to_sync_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Returns the project the client writes to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the fully qualified BigQuery table name.
    ///
    /// Formats the table name as `project_id.dataset_id.table_id` with proper quoting.
    pub fn full_table_name(
        &self,
        dataset_id: &BigQueryDatasetId,
        table_id: &str,
    ) -> SyncResult<String> {
        let project_id = sanitize_identifier(&self.project_id, "BigQuery project id")?;
        let dataset_id = sanitize_identifier(dataset_id, "BigQuery dataset id")?;
        let table_id = sanitize_identifier(table_id, "BigQuery table id")?;

        Ok(format!("`{project_id}.{dataset_id}.{table_id}`"))
    }

    /// Streams `rows` into a table with `tabledata.insertAll`.
    ///
    /// Each row is sent with its [`TargetRow::insert_id`]. If BigQuery rejects any row the call
    /// fails with [`ErrorKind::PartialBatchFailure`], even though the accepted rows stay written;
    /// redelivering the batch is safe because the insert ids are unchanged.
    pub async fn insert_all(
        &self,
        dataset_id: &BigQueryDatasetId,
        table_id: &str,
        rows: &[TargetRow],
    ) -> SyncResult<()> {
        let mut request = TableDataInsertAllRequest::new();
        for row in rows {
            request
                .add_row(Some(row.insert_id()), target_row_to_json(row))
                .map_err(bq_error_to_sync_error)?;
        }

        let response = self
            .client
            .tabledata()
            .insert_all(&self.project_id, dataset_id, table_id, request)
            .await
            .map_err(bq_error_to_sync_error)?;

        if let Some(insert_errors) = response.insert_errors
            && !insert_errors.is_empty()
        {
            let details = insert_errors
                .iter()
                .take(5)
                .map(|err| format!("row {:?}: {:?}", err.index, err.errors))
                .collect::<Vec<_>>()
                .join("\n");

            bail!(
                ErrorKind::PartialBatchFailure,
                "BigQuery rejected rows of the batch",
                format!(
                    "{} of {} rows were rejected by `{table_id}`:\n{details}",
                    insert_errors.len(),
                    rows.len()
                )
            );
        }

        Ok(())
    }

    /// Runs a `DELETE` statement for `predicate` and waits for the job to complete.
    pub async fn delete(
        &self,
        dataset_id: &BigQueryDatasetId,
        predicate: &DeletePredicate,
    ) -> SyncResult<()> {
        let full_table_name = self.full_table_name(dataset_id, &predicate.table)?;
        let (statement, parameters) = build_delete_statement(&full_table_name, predicate)?;

        let mut request = QueryRequest::new(statement);
        request.parameter_mode = Some("NAMED".to_string());
        request.query_parameters = Some(parameters);
        request.timeout_ms = Some(QUERY_TIMEOUT_MS);

        self.run_to_completion(request).await
    }

    /// Executes a query and polls its job until BigQuery reports it complete.
    async fn run_to_completion(&self, request: QueryRequest) -> SyncResult<()> {
        let response = self
            .client
            .job()
            .query(&self.project_id, request)
            .await
            .map_err(bq_error_to_sync_error)?;

        if response.job_complete.unwrap_or(false) {
            return Ok(());
        }

        let Some(job_reference) = response.job_reference else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "BigQuery returned an incomplete job without reference"
            );
        };
        let Some(job_id) = job_reference.job_id else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "BigQuery returned an incomplete job without id"
            );
        };

        loop {
            debug!(%job_id, "waiting for BigQuery job to complete");
            sleep(QUERY_POLL_INTERVAL).await;

            let parameters = GetQueryResultsParameters {
                location: job_reference.location.clone(),
                timeout_ms: Some(QUERY_TIMEOUT_MS),
                ..Default::default()
            };
            let results = self
                .client
                .job()
                .get_query_results(&self.project_id, &job_id, parameters)
                .await
                .map_err(bq_error_to_sync_error)?;

            if results.job_complete.unwrap_or(false) {
                return Ok(());
            }
        }
    }
}

impl fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// Sanitizes a BigQuery identifier for safe backtick quoting.
///
/// Rejects empty identifiers and identifiers containing control characters. Backticks and
/// backslashes are escaped with a backslash so the value can be wrapped in backticks without
/// altering the identifier or breaking out of it.
pub(crate) fn sanitize_identifier(identifier: &str, context: &str) -> SyncResult<String> {
    if identifier.is_empty() {
        bail!(
            ErrorKind::ConfigError,
            "Invalid BigQuery identifier",
            format!("{context} cannot be empty")
        );
    }

    if identifier.chars().any(char::is_control) {
        bail!(
            ErrorKind::ConfigError,
            "Invalid BigQuery identifier",
            format!("{context} contains control characters")
        );
    }

    let mut escaped = String::with_capacity(identifier.len());
    for ch in identifier.chars() {
        match ch {
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }

    Ok(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_identifiers() {
        assert_eq!(sanitize_identifier("orders", "table").unwrap(), "orders");
        assert_eq!(sanitize_identifier("a`b", "table").unwrap(), "a\\`b");
        assert_eq!(sanitize_identifier("a\\b", "table").unwrap(), "a\\\\b");
    }

    #[test]
    fn rejects_empty_and_control_identifiers() {
        let empty = sanitize_identifier("", "BigQuery table id").unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::ConfigError);
        assert_eq!(empty.detail(), Some("BigQuery table id cannot be empty"));

        let control = sanitize_identifier("orders\n", "BigQuery table id").unwrap_err();
        assert_eq!(control.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn classifies_client_errors() {
        let err = bq_error_to_sync_error(BQError::NoToken);
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert!(err.kind().is_transport_error());
    }
}
