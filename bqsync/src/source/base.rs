use std::future::Future;

use crate::error::SyncResult;
use crate::types::{LogPosition, ReplicationEvent};

/// Trait for replication clients delivering change notifications.
///
/// Notifications are delivered one at a time in log order. The client owns position persistence:
/// the pipeline only reports, through [`ReplicationSource::acknowledge`], the positions up to
/// which every change has been applied downstream.
pub trait ReplicationSource {
    /// Returns the next notification, or `None` once the stream has ended.
    fn next_event(&mut self) -> impl Future<Output = SyncResult<Option<ReplicationEvent>>> + Send;

    /// Confirms that every change up to `position` has been applied.
    fn acknowledge(&mut self, position: &LogPosition) -> impl Future<Output = SyncResult<()>> + Send;
}
