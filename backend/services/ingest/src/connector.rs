use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use hubsync_db::records::models::EntityType;
use hubsync_db::sync::models::{SyncRunStatus, TriggerSource};

use crate::error::SyncError;
use crate::mode::SyncMode;

/// Outcome of one entity's run, as reported to the trigger surface.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncResult {
    pub entity_type: EntityType,
    pub run_id: Uuid,
    pub records_fetched: i64,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub records_failed: i64,
    pub records_skipped: i64,
    pub status: SyncRunStatus,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// Run one sync for this entity. `Err` only when no terminal result could
    /// be produced at all.
    async fn run(&self, mode: SyncMode, trigger: TriggerSource)
        -> Result<EntitySyncResult, SyncError>;
}
