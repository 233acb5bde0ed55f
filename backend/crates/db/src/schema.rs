//! Idempotent bootstrap of the warehouse and ledger tables.

use sqlx::PgPool;

use crate::records::models::EntityType;
use hubsync_common::error::{HubsyncError, HubsyncResult};

const SYNC_RUNS_DDL: &str = "create table if not exists sync_runs (
   id uuid primary key,
   entity_type text not null,
   trigger_source text not null,
   status text not null default 'running',
   started_at timestamptz not null default now(),
   finished_at timestamptz,
   records_fetched bigint not null default 0,
   records_inserted bigint not null default 0,
   records_updated bigint not null default 0,
   records_failed bigint not null default 0,
   error_message text
 )";

const SYNC_RUNS_INDEX: &str = "create index if not exists sync_runs_watermark_idx
   on sync_runs(entity_type, status, finished_at desc)";

const SYNC_RUN_LOGS_DDL: &str = "create table if not exists sync_run_logs (
   id bigserial primary key,
   run_id uuid not null references sync_runs(id),
   level text not null,
   step text not null,
   message text not null,
   metadata jsonb not null default '{}'::jsonb,
   logged_at timestamptz not null default now()
 )";

const SYNC_RUN_LOGS_INDEX: &str =
    "create index if not exists sync_run_logs_run_idx on sync_run_logs(run_id, logged_at)";

/// DDL for one entity's warehouse table, derived from its field dictionary.
pub fn entity_table_ddl(entity: EntityType) -> String {
    let typed: Vec<String> = entity
        .fields()
        .iter()
        .map(|f| format!("   {} {}", f.column, f.kind.sql_type()))
        .collect();

    format!(
        "create table if not exists {} (\n   id text primary key,\n{},\n   \
         properties jsonb not null default '{{}}'::jsonb,\n   \
         last_synced_at timestamptz not null,\n   \
         last_updated_at timestamptz,\n   \
         sync_run_id uuid\n )",
        entity.table_name(),
        typed.join(",\n")
    )
}

/// Create every table the sync engine writes to, if missing.
pub async fn ensure_schema(pool: &PgPool) -> HubsyncResult<()> {
    let mut statements = vec![
        SYNC_RUNS_DDL.to_string(),
        SYNC_RUNS_INDEX.to_string(),
        SYNC_RUN_LOGS_DDL.to_string(),
        SYNC_RUN_LOGS_INDEX.to_string(),
    ];
    statements.extend(EntityType::ALL.iter().map(|e| entity_table_ddl(*e)));

    for statement in &statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(HubsyncError::database)?;
    }

    tracing::info!(statements = statements.len(), "warehouse schema ensured");
    Ok(())
}
