use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::lookup::{LookupClient, LookupResult, QueryParameter};

/// Lookup client used when no lookup connection is configured.
///
/// The dispatcher refuses to start with rules that need lookups and this client, so
/// [`LookupClient::query`] is only reachable through misuse.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLookup;

impl LookupClient for DisabledLookup {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn query(&self, sql: &str, _parameters: &[QueryParameter]) -> SyncResult<LookupResult> {
        bail!(
            ErrorKind::ConfigError,
            "No lookup connection is configured",
            format!("cannot run lookup query `{sql}`")
        )
    }
}
