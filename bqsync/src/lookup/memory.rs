use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::lookup::{LookupClient, LookupResult, QueryParameter};
use crate::sync_error;

type Responder = Arc<dyn Fn(&[QueryParameter]) -> SyncResult<LookupResult> + Send + Sync>;

#[derive(Default)]
struct Inner {
    responders: HashMap<String, Responder>,
    calls: Vec<(String, Vec<QueryParameter>)>,
}

/// In-memory lookup client answering registered queries with closures.
///
/// Unregistered queries fail with [`ErrorKind::LookupQueryFailed`].
#[derive(Clone, Default)]
pub struct MemoryLookupClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLookupClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the answer to `sql`.
    pub async fn respond<F>(&self, sql: impl Into<String>, responder: F)
    where
        F: Fn(&[QueryParameter]) -> SyncResult<LookupResult> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().await;
        inner.responders.insert(sql.into(), Arc::new(responder));
    }

    /// Returns every executed query with its parameters, in order.
    pub async fn calls(&self) -> Vec<(String, Vec<QueryParameter>)> {
        let inner = self.inner.lock().await;
        inner.calls.clone()
    }
}

impl fmt::Debug for MemoryLookupClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLookupClient").finish_non_exhaustive()
    }
}

impl LookupClient for MemoryLookupClient {
    async fn query(&self, sql: &str, parameters: &[QueryParameter]) -> SyncResult<LookupResult> {
        let responder = {
            let mut inner = self.inner.lock().await;
            inner.calls.push((sql.to_string(), parameters.to_vec()));
            inner.responders.get(sql).cloned()
        };

        match responder {
            Some(responder) => responder(parameters),
            None => Err(sync_error!(
                ErrorKind::LookupQueryFailed,
                "Lookup query is not registered",
                format!("no response registered for `{sql}`")
            )),
        }
    }
}
