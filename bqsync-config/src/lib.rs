//! Configuration types and loaders for bqsync services.
//!
//! Configuration is read either from a single file (the path handed to the replicator) or from
//! the hierarchical `configuration/` directory, and can always be overridden with `APP_`-prefixed
//! environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, expand_env, load_config, load_config_from_path};
