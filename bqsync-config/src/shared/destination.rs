use secrecy::SecretString;
use serde::Deserialize;

/// Configuration for the supported warehouse destinations.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Google BigQuery destination configuration.
    ///
    /// Credentials are taken from `service_account_key` when present, then from
    /// `service_account_key_path`, and otherwise from the application default credentials.
    BigQuery {
        /// Google Cloud project identifier.
        project_id: String,
        /// BigQuery dataset identifier that holds every target table.
        dataset_id: String,
        /// Service account key (JSON) used to authenticate with BigQuery.
        #[serde(default)]
        service_account_key: Option<SecretString>,
        /// Path to a service account key file.
        #[serde(default)]
        service_account_key_path: Option<String>,
    },
    /// In-memory destination that only logs what it receives. Useful for dry runs.
    Memory,
}
