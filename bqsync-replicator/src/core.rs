use bqsync::conversions::{ColumnCodec, SourceTimezone};
use bqsync::destination::Warehouse;
use bqsync::destination::memory::MemoryWarehouse;
use bqsync::error::SyncResult;
use bqsync::lookup::mysql::MySqlLookupClient;
use bqsync::lookup::{DisabledLookup, LookupClient};
use bqsync::pipeline::Pipeline;
use bqsync::replication::Dispatcher;
use bqsync::rules::{RuleResolver, RuleTable, TableFilter};
use bqsync::source::JsonLinesSource;
use bqsync_config::shared::{DestinationConfig, LookupConfig, PipelineConfig, ReplicatorConfig};
use bqsync_destinations::bigquery::BigQueryWarehouse;
use bqsync_destinations::encryption::install_crypto_provider_once;
use secrecy::ExposeSecret;
use tokio::io::{BufReader, Stdin, Stdout};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use crate::error::ReplicatorResult;

/// Source reading notifications from stdin and writing acknowledgements to stdout.
type StdioSource = JsonLinesSource<BufReader<Stdin>, Stdout>;

/// Starts the replicator service with the provided configuration.
///
/// Builds the warehouse and the lookup client described by the configuration and runs the
/// pipeline over the notifications arriving on stdin. Every combination of collaborators is
/// dispatched statically.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
) -> ReplicatorResult<()> {
    info!("starting replicator service");

    log_config(&replicator_config);

    match &replicator_config.destination {
        DestinationConfig::Memory => {
            let warehouse = MemoryWarehouse::new();

            start_with_warehouse(&replicator_config, warehouse).await?;
        }
        DestinationConfig::BigQuery {
            project_id,
            dataset_id,
            service_account_key,
            service_account_key_path,
        } => {
            install_crypto_provider_once();

            let warehouse = match (service_account_key, service_account_key_path) {
                (Some(key), _) => {
                    BigQueryWarehouse::new_with_key(
                        project_id.clone(),
                        dataset_id.clone(),
                        key.expose_secret(),
                    )
                    .await?
                }
                (None, Some(path)) => {
                    BigQueryWarehouse::new_with_key_path(
                        project_id.clone(),
                        dataset_id.clone(),
                        path,
                    )
                    .await?
                }
                (None, None) => {
                    BigQueryWarehouse::new_with_adc(project_id.clone(), dataset_id.clone()).await?
                }
            };

            start_with_warehouse(&replicator_config, warehouse).await?;
        }
    }

    Ok(())
}

async fn start_with_warehouse<W>(config: &ReplicatorConfig, warehouse: W) -> SyncResult<()>
where
    W: Warehouse + Clone + Send + Sync,
{
    match &config.lookup {
        Some(lookup_config) => {
            let lookup = MySqlLookupClient::connect(lookup_config).await?;

            start_pipeline(config, warehouse, lookup).await
        }
        None => start_pipeline(config, warehouse, DisabledLookup).await,
    }
}

/// Builds the pipeline and runs it until stdin closes, a shutdown signal arrives, or an error
/// halts replication.
async fn start_pipeline<W, L>(config: &ReplicatorConfig, warehouse: W, lookup: L) -> SyncResult<()>
where
    W: Warehouse + Clone + Send + Sync,
    L: LookupClient + Send + Sync,
{
    let rules = RuleTable::compile(&config.rules)?;
    let filter = TableFilter::from_config(config.pipeline.include_tables.as_deref(), &rules)?;
    let timezone = config.pipeline.source_timezone.parse::<SourceTimezone>()?;

    let dispatcher = Dispatcher::new(
        RuleResolver::new(rules),
        warehouse,
        lookup,
        ColumnCodec::new(timezone),
    )?;

    let source: StdioSource =
        JsonLinesSource::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
    let pipeline = Pipeline::new(source, filter, dispatcher);

    // Spawn a task to listen for shutdown signals and trigger shutdown.
    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(err) => {
                warn!(error = %err, "failed to register sigterm handler");
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down pipeline");
            }
            Some(_) = async {
                match sigterm.as_mut() {
                    Some(sigterm) => sigterm.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                info!("sigterm received, shutting down pipeline");
            }
        }

        shutdown_tx.shutdown();
    });

    let result = pipeline.run().await;

    // The pipeline may finish on its own, in which case the signal listener is no longer needed.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let stats = result?;
    info!(
        notifications = stats.notifications,
        dispatched_events = stats.dispatched_events,
        dropped_events = stats.dropped_events,
        filtered_events = stats.filtered_events,
        rows_uploaded = stats.rows_uploaded,
        rows_deleted = stats.rows_deleted,
        last_acknowledged = ?stats.last_acknowledged,
        "replicator finished"
    );

    Ok(())
}

fn log_config(config: &ReplicatorConfig) {
    log_destination_config(&config.destination);
    if let Some(lookup) = &config.lookup {
        log_lookup_config(lookup);
    }
    log_pipeline_config(&config.pipeline);
    debug!(rules = config.rules.len(), "rules config");
}

fn log_destination_config(config: &DestinationConfig) {
    match config {
        DestinationConfig::Memory => {
            debug!("using memory destination config");
        }
        DestinationConfig::BigQuery {
            project_id,
            dataset_id,
            service_account_key: _,
            service_account_key_path,
        } => {
            debug!(
                project_id,
                dataset_id,
                service_account_key_path = ?service_account_key_path,
                "using bigquery destination config"
            );
        }
    }
}

fn log_lookup_config(config: &LookupConfig) {
    debug!(
        host = config.host,
        port = config.port,
        username = config.username,
        database = ?config.database,
        max_connections = config.max_connections,
        "lookup mysql connection config"
    );
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        source_timezone = config.source_timezone,
        include_tables = ?config.include_tables,
        "pipeline config"
    );
}
