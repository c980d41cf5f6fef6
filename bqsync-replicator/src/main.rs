//! bqsync replicator binary.
//!
//! Reads row change notifications of a MySQL replication client from stdin, applies them to the
//! configured warehouse, and acknowledges safe positions on stdout. Logs go to stderr. Any error
//! halts the process with a non-zero exit code, leaving the last acknowledged position as the
//! point to resume from.

use std::path::PathBuf;
use std::process::ExitCode;

use bqsync_config::shared::ReplicatorConfig;
use bqsync_telemetry::tracing::init_tracing;
use clap::Parser;
use tracing::error;

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod core;
mod error;

/// Command line arguments of the replicator.
#[derive(Debug, Parser)]
#[command(version, about = "Propagates MySQL row changes into BigQuery")]
struct Args {
    /// Configuration file (YAML or JSON). Without it, `configuration/` is loaded.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Entry point for the replicator service.
///
/// This is the only place where errors stop the process: every failure is reported here and
/// turned into a non-zero exit code.
fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config(args.config.as_deref())?;

    // The flusher must outlive the runtime so that the final records reach stderr.
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(ReplicatorError::config)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))
}

/// Starts the replicator and logs the error that halted it, if any.
async fn async_main(replicator_config: ReplicatorConfig) -> ReplicatorResult<()> {
    if let Err(err) = start_replicator_with_config(replicator_config).await {
        error!(category = err.category(), "{err}");

        return Err(err);
    }

    Ok(())
}
