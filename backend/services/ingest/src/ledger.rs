use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use hubsync_db::records::models::EntityType;
use hubsync_db::sync::models::{
    LogLevel, RunCounters, SyncLogEntry, SyncRun, SyncRunStatus, TriggerSource,
};
use hubsync_db::sync::repositories::SyncRunRepository;

/// Step names written to the run log.
pub mod steps {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const TIMEOUT: &str = "timeout";
    pub const WATERMARK: &str = "watermark";
    pub const ROLLBACK: &str = "rollback";
    pub const FETCH: &str = "fetch";
    pub const TRANSFORM: &str = "transform";
    pub const WRITE: &str = "write";
}

/// Entries that reach the ledger table as well as the local stream.
pub fn should_forward(level: LogLevel, step: &str) -> bool {
    matches!(level, LogLevel::Error | LogLevel::Warning)
        || matches!(step, steps::START | steps::END | steps::TIMEOUT)
}

/// Durable local destination for every log entry.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, entry: &SyncLogEntry) -> HubsyncResult<()>;
}

/// Appends one JSON object per line to a file.
pub struct JsonlLogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl LogSink for JsonlLogSink {
    async fn write(&self, entry: &SyncLogEntry) -> HubsyncResult<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| HubsyncError::Internal(format!("encode log entry: {e}")))?;
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HubsyncError::Internal(format!("create {}: {e}", parent.display())))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| HubsyncError::Internal(format!("open {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HubsyncError::Internal(format!("append {}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| HubsyncError::Internal(format!("flush {}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Lifecycle record of sync runs: creation, progress log, terminal state.
pub struct RunLedger<S> {
    repo: S,
    sink: Arc<dyn LogSink>,
}

impl<S> RunLedger<S>
where
    S: SyncRunRepository,
{
    pub fn new(repo: S, sink: Arc<dyn LogSink>) -> Self {
        Self { repo, sink }
    }

    /// Persist a `running` run and log its start.
    pub async fn start(&self, entity: EntityType, trigger: TriggerSource) -> HubsyncResult<Uuid> {
        let run = SyncRun::start(entity.run_name(), trigger);
        self.repo.create_run(&run).await?;

        self.append_log(
            run.id,
            LogLevel::Info,
            steps::START,
            &format!("{entity} sync started"),
            serde_json::json!({ "entity": entity.as_str(), "trigger": trigger.as_str() }),
        )
        .await;

        Ok(run.id)
    }

    /// Record one log entry. Never fails: sink or ledger errors are reported
    /// through tracing and otherwise ignored.
    pub async fn append_log(
        &self,
        run_id: Uuid,
        level: LogLevel,
        step: &str,
        message: &str,
        metadata: serde_json::Value,
    ) {
        let entry = SyncLogEntry {
            run_id,
            level,
            step: step.to_string(),
            message: message.to_string(),
            metadata,
            logged_at: Utc::now(),
        };

        mirror_to_tracing(&entry);

        if let Err(e) = self.sink.write(&entry).await {
            tracing::warn!(run_id = %run_id, error = %e, "failed to append to local run log");
        }

        if should_forward(level, step) {
            if let Err(e) = self.repo.append_log(&entry).await {
                tracing::warn!(run_id = %run_id, error = %e, "failed to forward run log entry");
            }
        }
    }

    /// Close a run with its computed status and counters.
    pub async fn complete(
        &self,
        run_id: Uuid,
        counters: &RunCounters,
        status: SyncRunStatus,
    ) -> HubsyncResult<SyncRun> {
        if !status.is_terminal() {
            return Err(HubsyncError::Validation(format!(
                "sync run {run_id} cannot be closed as {status}"
            )));
        }
        let run = self.repo.finish_run(run_id, status, counters, None).await?;

        let level = match status {
            SyncRunStatus::Success => LogLevel::Info,
            SyncRunStatus::Partial => LogLevel::Warning,
            SyncRunStatus::Failed | SyncRunStatus::Running => LogLevel::Error,
        };
        self.append_log(
            run_id,
            level,
            steps::END,
            &format!("sync finished with status {status}"),
            end_metadata(status, counters),
        )
        .await;

        Ok(run)
    }

    /// Close a run as `failed` with an error message.
    pub async fn fail(
        &self,
        run_id: Uuid,
        error_message: &str,
        counters: &RunCounters,
    ) -> HubsyncResult<SyncRun> {
        let run = self
            .repo
            .finish_run(run_id, SyncRunStatus::Failed, counters, Some(error_message))
            .await?;

        let mut metadata = end_metadata(SyncRunStatus::Failed, counters);
        metadata["error"] = serde_json::Value::String(error_message.to_string());
        self.append_log(
            run_id,
            LogLevel::Error,
            steps::END,
            &format!("sync failed: {error_message}"),
            metadata,
        )
        .await;

        Ok(run)
    }
}

fn end_metadata(status: SyncRunStatus, counters: &RunCounters) -> serde_json::Value {
    serde_json::json!({
        "status": status.as_str(),
        "records_fetched": counters.fetched,
        "records_inserted": counters.inserted,
        "records_updated": counters.updated,
        "records_failed": counters.failed,
    })
}

fn mirror_to_tracing(entry: &SyncLogEntry) {
    let run_id = entry.run_id;
    let step = entry.step.as_str();
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Debug => tracing::debug!(%run_id, step, "{message}"),
        LogLevel::Info => tracing::info!(%run_id, step, "{message}"),
        LogLevel::Warning => tracing::warn!(%run_id, step, "{message}"),
        LogLevel::Error => tracing::error!(%run_id, step, "{message}"),
    }
}
