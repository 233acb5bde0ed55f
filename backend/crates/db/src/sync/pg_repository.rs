use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sync::models::{RunCounters, SyncLogEntry, SyncRun, SyncRunStatus, TriggerSource};
use crate::sync::repositories::SyncRunRepository;
use hubsync_common::error::{HubsyncError, HubsyncResult};

const RUN_COLUMNS: &str = "id, entity_type, trigger_source, status, started_at, finished_at, \
     records_fetched, records_inserted, records_updated, records_failed, error_message";

#[derive(Clone)]
pub struct PgSyncRunRepository {
    pool: PgPool,
}

impl PgSyncRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> HubsyncResult<SyncRun> {
        let status_raw: String = row.get("status");
        let trigger_raw: String = row.get("trigger_source");

        Ok(SyncRun {
            id: row.get("id"),
            entity_type: row.get("entity_type"),
            trigger_source: trigger_raw
                .parse::<TriggerSource>()
                .map_err(HubsyncError::Internal)?,
            status: status_raw
                .parse::<SyncRunStatus>()
                .map_err(HubsyncError::Internal)?,
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            counters: RunCounters {
                fetched: row.get("records_fetched"),
                inserted: row.get("records_inserted"),
                updated: row.get("records_updated"),
                failed: row.get("records_failed"),
            },
            error_message: row.get("error_message"),
        })
    }
}

#[async_trait]
impl SyncRunRepository for PgSyncRunRepository {
    async fn create_run(&self, run: &SyncRun) -> HubsyncResult<()> {
        sqlx::query(
            "insert into sync_runs (id, entity_type, trigger_source, status, started_at)
             values ($1, $2, $3, $4, $5)",
        )
        .bind(run.id)
        .bind(&run.entity_type)
        .bind(run.trigger_source.as_str())
        .bind(run.status.as_str())
        .bind(run.started_at)
        .execute(&self.pool)
        .await
        .map_err(HubsyncError::database)?;
        Ok(())
    }

    async fn finish_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> HubsyncResult<SyncRun> {
        let row = sqlx::query(&format!(
            "update sync_runs
             set status = $1, finished_at = $2,
                 records_fetched = $3, records_inserted = $4,
                 records_updated = $5, records_failed = $6,
                 error_message = $7
             where id = $8 and status = 'running'
             returning {RUN_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(counters.fetched)
        .bind(counters.inserted)
        .bind(counters.updated)
        .bind(counters.failed)
        .bind(error_message)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(HubsyncError::database)?;

        match row {
            Some(r) => Self::map_row(r),
            None => Err(HubsyncError::NotFound(format!(
                "sync run {id} does not exist or is already finished"
            ))),
        }
    }

    async fn append_log(&self, entry: &SyncLogEntry) -> HubsyncResult<()> {
        sqlx::query(
            "insert into sync_run_logs (run_id, level, step, message, metadata, logged_at)
             values ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.run_id)
        .bind(entry.level.as_str())
        .bind(&entry.step)
        .bind(&entry.message)
        .bind(Json(&entry.metadata))
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await
        .map_err(HubsyncError::database)?;
        Ok(())
    }

    async fn last_success_finished_at(
        &self,
        run_name: &str,
    ) -> HubsyncResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "select finished_at from sync_runs
             where entity_type = $1 and status = 'success' and finished_at is not null
             order by finished_at desc
             limit 1",
        )
        .bind(run_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(HubsyncError::database)?;

        Ok(row.map(|r| r.get("finished_at")))
    }
}
