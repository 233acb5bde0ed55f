use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;

use hubsync_db::records::models::EntityType;
use hubsync_db::sync::models::{SyncRunStatus, TriggerSource};

use crate::connector::{Connector, EntitySyncResult};
use crate::error::SyncError;
use crate::mode::SyncMode;

/// Aggregate of one invocation. `None` marks an entity that produced no result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub results: BTreeMap<EntityType, Option<EntitySyncResult>>,
    pub duration_seconds: f64,
}

impl SyncSummary {
    /// `0` when every entity ended `success` or `partial`, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        let all_ok = self.results.values().all(|r| {
            r.as_ref()
                .is_some_and(|r| matches!(r.status, SyncRunStatus::Success | SyncRunStatus::Partial))
        });
        if all_ok {
            0
        } else {
            1
        }
    }
}

/// Runs entity connectors concurrently and collects every outcome.
pub struct SyncOrchestrator {
    connectors: Vec<Arc<dyn Connector>>,
}

impl SyncOrchestrator {
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    /// Sync a single entity type.
    pub async fn run_sync(
        &self,
        entity: EntityType,
        mode: SyncMode,
        trigger: TriggerSource,
    ) -> Result<SyncSummary, SyncError> {
        self.run(&[entity], mode, trigger).await
    }

    /// Sync `entities` in parallel. Every task is awaited; one entity's
    /// failure never cancels another. The only invocation-level error is a
    /// run record that could not be created.
    pub async fn run(
        &self,
        entities: &[EntityType],
        mode: SyncMode,
        trigger: TriggerSource,
    ) -> Result<SyncSummary, SyncError> {
        let started = Instant::now();
        let mut results: BTreeMap<EntityType, Option<EntitySyncResult>> =
            entities.iter().map(|e| (*e, None)).collect();

        let mut tasks = JoinSet::new();
        for entity in results.keys().copied() {
            match self.connectors.iter().find(|c| c.entity_type() == entity) {
                Some(connector) => {
                    let connector = Arc::clone(connector);
                    tasks.spawn(async move { (entity, connector.run(mode, trigger).await) });
                }
                None => tracing::warn!(entity = %entity, "no connector configured, skipping"),
            }
        }

        tracing::info!(tasks = tasks.len(), mode = %mode, trigger = trigger.as_str(), "sync started");

        let mut fatal: Option<SyncError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((entity, Ok(result))) => {
                    results.insert(entity, Some(result));
                }
                Ok((entity, Err(e))) if e.is_fatal() => {
                    tracing::error!(entity = %entity, error = %e, "could not start sync run");
                    fatal.get_or_insert(e);
                }
                Ok((entity, Err(e))) => {
                    tracing::error!(entity = %entity, error = %e, "entity sync produced no result");
                }
                Err(e) => {
                    tracing::error!(error = %e, "entity sync task aborted");
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let summary = SyncSummary {
            results,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            duration_seconds = summary.duration_seconds,
            exit_code = summary.exit_code(),
            "sync finished"
        );
        Ok(summary)
    }
}
