use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sync::models::{RunCounters, SyncLogEntry, SyncRun, SyncRunStatus};
use hubsync_common::error::HubsyncResult;

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Persist a freshly started run (status `running`).
    async fn create_run(&self, run: &SyncRun) -> HubsyncResult<()>;

    /// Move a `running` run to its terminal status, stamping `finished_at`.
    /// Fails with `NotFound` if the run does not exist or is already terminal.
    async fn finish_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> HubsyncResult<SyncRun>;

    /// Append one forwarded log entry.
    async fn append_log(&self, entry: &SyncLogEntry) -> HubsyncResult<()>;

    /// `finished_at` of the newest `success` run recorded under `run_name`.
    async fn last_success_finished_at(
        &self,
        run_name: &str,
    ) -> HubsyncResult<Option<DateTime<Utc>>>;
}
