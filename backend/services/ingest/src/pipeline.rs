use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use hubsync_config::AppConfig;
use hubsync_db::records::models::{EntityType, WarehouseRow};
use hubsync_db::records::repositories::RecordRepository;
use hubsync_db::sync::models::{LogLevel, RunCounters, SyncRunStatus, TriggerSource};
use hubsync_db::sync::repositories::SyncRunRepository;

use crate::connector::{Connector, EntitySyncResult};
use crate::crm::client::CrmClient;
use crate::error::SyncError;
use crate::ledger::{steps, LogSink, RunLedger};
use crate::mode::SyncMode;
use crate::transform::{collapse_duplicates, to_warehouse_row};
use crate::watermark::{WatermarkSource, WatermarkStore};
use crate::writer::{MergeUpsertWriter, WriteOutcome, WriteProgress, DEFAULT_BATCH_SIZE};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Hard deadline for one run, fetch and write included.
    pub timeout: Duration,
    /// Incremental horizon when no successful run exists.
    pub fallback: chrono::Duration,
    pub batch_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            fallback: chrono::Duration::days(7),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: config.sync_timeout(),
            fallback: chrono::Duration::days(i64::from(config.sync_fallback_days)),
            batch_size: config.sync_batch_size,
        }
    }
}

/// Counters that stay readable if the run is abandoned mid-flight.
#[derive(Debug, Default)]
struct RunProgress {
    fetched: AtomicI64,
    writes: WriteProgress,
}

impl RunProgress {
    fn counters(&self) -> RunCounters {
        RunCounters {
            fetched: self.fetched.load(Ordering::Relaxed),
            inserted: self.writes.inserted(),
            updated: self.writes.updated(),
            failed: self.writes.failed(),
        }
    }
}

/// One synchronization of one entity type: watermark, fetch, transform,
/// merge-upsert, ledger.
pub struct EntityPipeline<R, S> {
    entity: EntityType,
    client: CrmClient,
    writer: MergeUpsertWriter<R>,
    ledger: RunLedger<S>,
    watermarks: WatermarkStore<S>,
    timeout: Duration,
}

impl<R, S> EntityPipeline<R, S>
where
    R: RecordRepository,
    S: SyncRunRepository + Clone,
{
    pub fn new(
        entity: EntityType,
        client: CrmClient,
        records: R,
        runs: S,
        sink: Arc<dyn LogSink>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            entity,
            client,
            writer: MergeUpsertWriter::new(records, settings.batch_size),
            ledger: RunLedger::new(runs.clone(), sink),
            watermarks: WatermarkStore::new(runs, settings.fallback),
            timeout: settings.timeout,
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        mode: SyncMode,
        progress: &RunProgress,
    ) -> Result<WriteOutcome, SyncError> {
        let entity = self.entity;
        let now = Utc::now();

        let baseline = if mode.needs_watermark() {
            let (since, source) = self
                .watermarks
                .since_or_fallback(entity, now)
                .await
                .map_err(SyncError::Ledger)?;
            let source = match source {
                WatermarkSource::LastSuccess(name) => name.to_string(),
                WatermarkSource::Fallback => "fallback".to_string(),
            };
            self.ledger
                .append_log(
                    run_id,
                    LogLevel::Info,
                    steps::WATERMARK,
                    &format!("incremental lower bound {}", since.to_rfc3339()),
                    serde_json::json!({ "since": since, "source": source }),
                )
                .await;
            Some(since)
        } else {
            None
        };

        if let SyncMode::RollbackFromDate(from) = mode {
            self.ledger
                .append_log(
                    run_id,
                    LogLevel::Warning,
                    steps::ROLLBACK,
                    &format!("re-syncing {entity} from {}", from.to_rfc3339()),
                    serde_json::json!({ "from": from }),
                )
                .await;
        }

        let window = mode.resolve(now, baseline);
        self.ledger
            .append_log(
                run_id,
                LogLevel::Info,
                steps::FETCH,
                &format!("fetching {entity} records ({mode})"),
                serde_json::json!({ "mode": mode.as_str(), "since": window.since, "until": window.until }),
            )
            .await;

        let properties = entity.requested_properties();
        let records = self.client.fetch_records(entity, &properties, &window).await?;
        let fetched = records.len();
        progress.fetched.store(fetched as i64, Ordering::Relaxed);

        let records = collapse_duplicates(records);
        if records.len() < fetched {
            self.ledger
                .append_log(
                    run_id,
                    LogLevel::Debug,
                    steps::TRANSFORM,
                    &format!("collapsed {} repeated deliveries", fetched - records.len()),
                    serde_json::json!({ "fetched": fetched, "unique": records.len() }),
                )
                .await;
        }
        self.ledger
            .append_log(
                run_id,
                LogLevel::Info,
                steps::FETCH,
                &format!("fetched {fetched} records"),
                serde_json::json!({ "fetched": fetched, "unique": records.len() }),
            )
            .await;

        let synced_at = Utc::now();
        let rows: Vec<WarehouseRow> = records
            .iter()
            .map(|r| to_warehouse_row(entity, r, run_id, synced_at))
            .collect();

        let outcome = self.writer.write(entity, rows, &progress.writes).await;

        for failure in &outcome.failures {
            self.ledger
                .append_log(
                    run_id,
                    LogLevel::Warning,
                    steps::WRITE,
                    &format!("batch {} failed", failure.batch),
                    serde_json::json!({
                        "batch": failure.batch,
                        "size": failure.size,
                        "error": failure.error,
                    }),
                )
                .await;
        }

        Ok(outcome)
    }
}

#[async_trait]
impl<R, S> Connector for EntityPipeline<R, S>
where
    R: RecordRepository + 'static,
    S: SyncRunRepository + Clone + 'static,
{
    fn entity_type(&self) -> EntityType {
        self.entity
    }

    async fn run(
        &self,
        mode: SyncMode,
        trigger: TriggerSource,
    ) -> Result<EntitySyncResult, SyncError> {
        let started = Instant::now();
        let entity = self.entity;

        let run_id = self
            .ledger
            .start(entity, trigger)
            .await
            .map_err(SyncError::StartRun)?;

        let progress = RunProgress::default();

        // The inner future is dropped at the deadline, so nothing it had in
        // flight can write after the run is marked failed.
        let result = tokio::time::timeout(self.timeout, self.execute(run_id, mode, &progress)).await;
        let counters = progress.counters();

        let (status, skipped) = match result {
            Ok(Ok(outcome)) => {
                let status = outcome.status();
                self.ledger
                    .complete(run_id, &counters, status)
                    .await
                    .map_err(SyncError::Ledger)?;
                (status, outcome.skipped as i64)
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                let step = match &e {
                    SyncError::Fetch(_) => steps::FETCH,
                    _ => steps::WATERMARK,
                };
                self.ledger
                    .append_log(run_id, LogLevel::Error, step, &message, serde_json::json!({}))
                    .await;
                self.ledger
                    .fail(run_id, &message, &counters)
                    .await
                    .map_err(SyncError::Ledger)?;
                (SyncRunStatus::Failed, progress.writes.skipped())
            }
            Err(_) => {
                let message = SyncError::Timeout(self.timeout).to_string();
                self.ledger
                    .append_log(
                        run_id,
                        LogLevel::Error,
                        steps::TIMEOUT,
                        &message,
                        serde_json::json!({ "timeout_secs": self.timeout.as_secs() }),
                    )
                    .await;
                self.ledger
                    .fail(run_id, &message, &counters)
                    .await
                    .map_err(SyncError::Ledger)?;
                (SyncRunStatus::Failed, progress.writes.skipped())
            }
        };

        let result = EntitySyncResult {
            entity_type: entity,
            run_id,
            records_fetched: counters.fetched,
            records_inserted: counters.inserted,
            records_updated: counters.updated,
            records_failed: counters.failed,
            records_skipped: skipped,
            status,
            duration_seconds: started.elapsed().as_secs_f64(),
        };

        tracing::info!(
            entity = %entity,
            run_id = %run_id,
            status = %status,
            fetched = result.records_fetched,
            inserted = result.records_inserted,
            updated = result.records_updated,
            failed = result.records_failed,
            "entity sync finished"
        );

        Ok(result)
    }
}
