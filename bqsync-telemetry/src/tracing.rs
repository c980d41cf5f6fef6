use std::io;
use std::sync::Once;

use bqsync_config::Environment;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

/// Env variable enabling log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Flushes buffered log lines when dropped. Keep it alive until the process exits.
pub type LogFlusher = WorkerGuard;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to install the log bridge: {0}")]
    LogTracer(String),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global tracing subscriber for `app_name`.
///
/// Logs are written to stderr through a non-blocking writer, since stdout carries
/// acknowledgements to the replication client. Production emits JSON lines; development emits a
/// human-readable format. The level filter comes from `RUST_LOG`, defaulting to `info`. Records
/// of crates using the `log` facade are forwarded to tracing.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;

    LogTracer::init().map_err(|err| TracingError::LogTracer(err.to_string()))?;

    let (writer, flusher) = tracing_appender::non_blocking(io::stderr());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match environment {
        Environment::Prod => {
            let subscriber = Registry::default().with(filter).with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(writer),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        Environment::Dev => {
            let subscriber = Registry::default()
                .with(filter)
                .with(fmt::layer().with_writer(writer));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    tracing::info!(app_name, %environment, "tracing initialized");

    Ok(flusher)
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
///
/// Output goes through the test writer so it is captured per test.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_test_writer());

        // Another test harness may already have installed a subscriber.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
