use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SyncResult;
use crate::source::ReplicationSource;
use crate::types::{LogPosition, ReplicationEvent};

/// Replication source replaying a fixed list of notifications.
///
/// Acknowledged positions are recorded in a shared list, so a clone kept by the caller can
/// inspect them after the source was moved into a pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    events: VecDeque<ReplicationEvent>,
    acknowledged: Arc<Mutex<Vec<LogPosition>>>,
}

impl MemorySource {
    pub fn new(events: impl IntoIterator<Item = ReplicationEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            acknowledged: Arc::default(),
        }
    }

    /// Returns the acknowledged positions, in order.
    pub async fn acknowledged(&self) -> Vec<LogPosition> {
        self.acknowledged.lock().await.clone()
    }
}

impl ReplicationSource for MemorySource {
    async fn next_event(&mut self) -> SyncResult<Option<ReplicationEvent>> {
        Ok(self.events.pop_front())
    }

    async fn acknowledge(&mut self, position: &LogPosition) -> SyncResult<()> {
        self.acknowledged.lock().await.push(position.clone());
        Ok(())
    }
}
