use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use hubsync_common::error::HubsyncResult;
use hubsync_db::records::models::{EntityType, WarehouseRow};
use hubsync_db::records::repositories::RecordRepository;
use hubsync_db::sync::models::SyncRunStatus;

use crate::transform::typed_columns;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Row classification for one successfully written batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub inserted: usize,
    pub updated: usize,
    /// Append-only rows that already existed and were left untouched.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// 1-based position of the batch within the write.
    pub batch: usize,
    pub size: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub batches: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

impl WriteOutcome {
    pub fn failed_batches(&self) -> usize {
        self.failures.len()
    }

    /// Terminal status implied by batch results alone.
    pub fn status(&self) -> SyncRunStatus {
        match self.failed_batches() {
            0 => SyncRunStatus::Success,
            n if n < self.batches => SyncRunStatus::Partial,
            _ => SyncRunStatus::Failed,
        }
    }

    fn record(&mut self, batch: usize, size: usize, result: HubsyncResult<BatchResult>) {
        self.batches += 1;
        match result {
            Ok(r) => {
                self.inserted += r.inserted;
                self.updated += r.updated;
                self.skipped += r.skipped;
            }
            Err(e) => {
                self.failed += size;
                self.failures.push(BatchFailure {
                    batch,
                    size,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Running totals readable while a write is still in flight.
#[derive(Debug, Default)]
pub struct WriteProgress {
    inserted: AtomicI64,
    updated: AtomicI64,
    skipped: AtomicI64,
    failed: AtomicI64,
}

impl WriteProgress {
    fn add(&self, batch: &HubsyncResult<BatchResult>, size: usize) {
        match batch {
            Ok(r) => {
                self.inserted.fetch_add(r.inserted as i64, Ordering::Relaxed);
                self.updated.fetch_add(r.updated as i64, Ordering::Relaxed);
                self.skipped.fetch_add(r.skipped as i64, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(size as i64, Ordering::Relaxed);
            }
        }
    }

    pub fn inserted(&self) -> i64 {
        self.inserted.load(Ordering::Relaxed)
    }

    pub fn updated(&self) -> i64 {
        self.updated.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> i64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> i64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Writes warehouse rows in bounded batches, merging each incoming document
/// into whatever the destination already holds for that id.
///
/// The read of existing documents and the upsert are separate statements, so
/// two writers on the same entity can lose each other's keys. Runs for one
/// entity are expected to be serialized by the scheduler.
pub struct MergeUpsertWriter<R> {
    repo: R,
    batch_size: usize,
}

impl<R> MergeUpsertWriter<R>
where
    R: RecordRepository,
{
    pub fn new(repo: R, batch_size: usize) -> Self {
        Self {
            repo,
            batch_size: batch_size.max(1),
        }
    }

    /// Write every row, one batch at a time. A failed batch is recorded and
    /// the remaining batches still run.
    pub async fn write(
        &self,
        entity: EntityType,
        rows: Vec<WarehouseRow>,
        progress: &WriteProgress,
    ) -> WriteOutcome {
        let rows = dedupe_rows(entity, rows);
        let mut outcome = WriteOutcome::default();

        for (idx, chunk) in rows.chunks(self.batch_size).enumerate() {
            let batch = idx + 1;
            let result = self.write_batch(entity, chunk).await;
            progress.add(&result, chunk.len());

            match &result {
                Ok(r) => tracing::debug!(
                    entity = %entity,
                    batch,
                    inserted = r.inserted,
                    updated = r.updated,
                    skipped = r.skipped,
                    "batch written"
                ),
                Err(e) => tracing::warn!(
                    entity = %entity,
                    batch,
                    size = chunk.len(),
                    error = %e,
                    "batch write failed, continuing with next batch"
                ),
            }

            outcome.record(batch, chunk.len(), result);
        }

        outcome
    }

    /// Write one batch. Ids must be unique within `rows`.
    pub async fn write_batch(
        &self,
        entity: EntityType,
        rows: &[WarehouseRow],
    ) -> HubsyncResult<BatchResult> {
        if rows.is_empty() {
            return Ok(BatchResult::default());
        }

        if entity.is_append_only() {
            let inserted = self.repo.insert_rows_ignoring_conflicts(entity, rows).await? as usize;
            return Ok(BatchResult {
                inserted,
                updated: 0,
                skipped: rows.len().saturating_sub(inserted),
            });
        }

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let existing = self.repo.fetch_documents(entity, &ids).await?;

        let mut result = BatchResult::default();
        let merged: Vec<WarehouseRow> = rows
            .iter()
            .map(|row| match existing.get(&row.id) {
                Some(old) => {
                    result.updated += 1;
                    let document = old.merged_with(&row.document);
                    WarehouseRow {
                        columns: typed_columns(entity, &document),
                        document,
                        ..row.clone()
                    }
                }
                None => {
                    result.inserted += 1;
                    row.clone()
                }
            })
            .collect();

        self.repo.upsert_rows(entity, &merged).await?;
        Ok(result)
    }
}

/// One row per id. Documents are merged and typed columns re-read from the
/// merged document.
fn dedupe_rows(entity: EntityType, rows: Vec<WarehouseRow>) -> Vec<WarehouseRow> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<WarehouseRow> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(&row.id) {
            Some(&pos) => {
                let earlier = &out[pos];
                let document = earlier.document.merged_with(&row.document);
                let last_updated_at = row.last_updated_at.or(earlier.last_updated_at);
                out[pos] = WarehouseRow {
                    columns: typed_columns(entity, &document),
                    document,
                    last_updated_at,
                    ..row
                };
            }
            None => {
                index.insert(row.id.clone(), out.len());
                out.push(row);
            }
        }
    }

    out
}
