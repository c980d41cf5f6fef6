use std::path::Path;

use bqsync_config::shared::ReplicatorConfig;
use bqsync_config::{load_config, load_config_from_path};

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the replicator configuration.
///
/// An explicit `path` is read as a single file with environment variable expansion; otherwise the
/// hierarchical `configuration/` directory is used.
pub fn load_replicator_config(path: Option<&Path>) -> ReplicatorResult<ReplicatorConfig> {
    let config = match path {
        Some(path) => load_config_from_path::<ReplicatorConfig>(path),
        None => load_config::<ReplicatorConfig>(),
    }
    .map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
