//! In-memory fakes for the repository traits and the log sink.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hubsync_common::error::{HubsyncError, HubsyncResult};
use hubsync_db::records::document::Document;
use hubsync_db::records::models::{EntityType, WarehouseRow};
use hubsync_db::records::repositories::RecordRepository;
use hubsync_db::sync::models::{
    RunCounters, SyncLogEntry, SyncRun, SyncRunStatus, TriggerSource,
};
use hubsync_db::sync::repositories::SyncRunRepository;

use crate::ledger::LogSink;

// ── Records ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryRecordRepository {
    rows: Arc<Mutex<HashMap<(EntityType, String), WarehouseRow>>>,
    write_calls: Arc<Mutex<usize>>,
    failing_writes: Arc<Mutex<HashSet<usize>>>,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th write call (1-based, upsert or insert) fail.
    pub fn fail_write(&self, n: usize) {
        self.failing_writes.lock().unwrap().insert(n);
    }

    pub fn seed(&self, entity: EntityType, id: &str, document: Document) {
        let row = WarehouseRow {
            id: id.to_string(),
            columns: Vec::new(),
            document,
            last_synced_at: Utc::now(),
            last_updated_at: None,
            sync_run_id: Uuid::nil(),
        };
        self.rows
            .lock()
            .unwrap()
            .insert((entity, id.to_string()), row);
    }

    pub fn row(&self, entity: EntityType, id: &str) -> Option<WarehouseRow> {
        self.rows
            .lock()
            .unwrap()
            .get(&(entity, id.to_string()))
            .cloned()
    }

    pub fn document(&self, entity: EntityType, id: &str) -> Option<Document> {
        self.row(entity, id).map(|r| r.document)
    }

    pub fn count(&self, entity: EntityType) -> usize {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(e, _)| *e == entity)
            .count()
    }

    pub fn write_calls(&self) -> usize {
        *self.write_calls.lock().unwrap()
    }

    fn next_write(&self) -> HubsyncResult<()> {
        let call = {
            let mut calls = self.write_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.failing_writes.lock().unwrap().contains(&call) {
            return Err(HubsyncError::Database(format!(
                "simulated failure on write {call}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn fetch_documents(
        &self,
        entity: EntityType,
        ids: &[String],
    ) -> HubsyncResult<HashMap<String, Document>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                rows.get(&(entity, id.clone()))
                    .map(|r| (id.clone(), r.document.clone()))
            })
            .collect())
    }

    async fn upsert_rows(&self, entity: EntityType, rows: &[WarehouseRow]) -> HubsyncResult<()> {
        self.next_write()?;
        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            let key = (entity, row.id.clone());
            let mut row = row.clone();
            if let Some(prev) = stored.get(&key) {
                row.last_updated_at = row.last_updated_at.or(prev.last_updated_at);
            }
            stored.insert(key, row);
        }
        Ok(())
    }

    async fn insert_rows_ignoring_conflicts(
        &self,
        entity: EntityType,
        rows: &[WarehouseRow],
    ) -> HubsyncResult<u64> {
        self.next_write()?;
        let mut stored = self.rows.lock().unwrap();
        let mut inserted = 0;
        for row in rows {
            let key = (entity, row.id.clone());
            if !stored.contains_key(&key) {
                stored.insert(key, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

// ── Runs ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemorySyncRunRepository {
    runs: Arc<Mutex<Vec<SyncRun>>>,
    logs: Arc<Mutex<Vec<SyncLogEntry>>>,
    fail_create: Arc<Mutex<bool>>,
    fail_lookup: Arc<Mutex<bool>>,
}

impl MemorySyncRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn fail_lookup(&self) {
        *self.fail_lookup.lock().unwrap() = true;
    }

    /// Record an already finished run, as an earlier deployment would have.
    pub fn seed_finished(
        &self,
        run_name: &str,
        status: SyncRunStatus,
        finished_at: DateTime<Utc>,
    ) -> Uuid {
        let mut run = SyncRun::start(run_name, TriggerSource::Scheduled);
        run.status = status;
        run.started_at = finished_at;
        run.finished_at = Some(finished_at);
        let id = run.id;
        self.runs.lock().unwrap().push(run);
        id
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }

    pub fn run(&self, id: Uuid) -> Option<SyncRun> {
        self.runs.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn logs(&self) -> Vec<SyncLogEntry> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncRunRepository for MemorySyncRunRepository {
    async fn create_run(&self, run: &SyncRun) -> HubsyncResult<()> {
        if *self.fail_create.lock().unwrap() {
            return Err(HubsyncError::Database("connection refused".to_string()));
        }
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn finish_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> HubsyncResult<SyncRun> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|r| r.id == id && r.status == SyncRunStatus::Running)
            .ok_or_else(|| HubsyncError::NotFound(format!("sync run {id}")))?;

        run.status = status;
        run.finished_at = Some(Utc::now());
        run.counters = *counters;
        run.error_message = error_message.map(str::to_string);
        Ok(run.clone())
    }

    async fn append_log(&self, entry: &SyncLogEntry) -> HubsyncResult<()> {
        self.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn last_success_finished_at(
        &self,
        run_name: &str,
    ) -> HubsyncResult<Option<DateTime<Utc>>> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(HubsyncError::Database("connection reset".to_string()));
        }
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.entity_type == run_name && r.status == SyncRunStatus::Success)
            .filter_map(|r| r.finished_at)
            .max())
    }
}

// ── Log sink ────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryLogSink {
    entries: Arc<Mutex<Vec<SyncLogEntry>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn steps(&self, run_id: Uuid) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .map(|e| e.step)
            .collect()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write(&self, entry: &SyncLogEntry) -> HubsyncResult<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
