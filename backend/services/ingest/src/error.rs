use std::time::Duration;

use hubsync_common::error::HubsyncError;

use crate::crm::client::CrmClientError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The run record itself could not be created; nothing else is observable.
    #[error("could not start sync run: {0}")]
    StartRun(#[source] HubsyncError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] CrmClientError),

    #[error("run ledger error: {0}")]
    Ledger(#[source] HubsyncError),

    #[error("sync timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl SyncError {
    /// Whether this error should abort the whole invocation rather than one entity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StartRun(_))
    }
}
