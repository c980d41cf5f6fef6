use secrecy::SecretString;
use serde::Deserialize;

const fn default_port() -> u16 {
    LookupConfig::DEFAULT_PORT
}

const fn default_max_connections() -> u32 {
    LookupConfig::DEFAULT_MAX_CONNECTIONS
}

/// Connection settings for the MySQL server used by `rewrite-via-query` actions.
///
/// This is usually the replication source itself, queried through a regular connection.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    /// Host name or IP address of the MySQL server.
    pub host: String,
    /// Port of the MySQL server.
    #[serde(default = "default_port")]
    pub port: u16,
    /// User used to run lookup queries.
    pub username: String,
    /// Password of `username`.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Default database for unqualified table names in lookup queries.
    #[serde(default)]
    pub database: Option<String>,
    /// Size of the connection pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl LookupConfig {
    /// Default MySQL port.
    pub const DEFAULT_PORT: u16 = 3306;

    /// Default connection pool size. Events are processed one at a time, so a small pool suffices.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;
}
