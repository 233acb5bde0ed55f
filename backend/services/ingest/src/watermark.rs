use chrono::{DateTime, Duration, Utc};

use hubsync_common::error::HubsyncResult;
use hubsync_db::records::models::EntityType;
use hubsync_db::sync::repositories::SyncRunRepository;

/// Where the lower bound of an incremental window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkSource {
    /// Finished-at of the last successful run, under the given run name.
    LastSuccess(&'static str),
    Fallback,
}

/// Read-only view over the run ledger: last successful finish per entity.
pub struct WatermarkStore<S> {
    repo: S,
    fallback: Duration,
}

impl<S> WatermarkStore<S>
where
    S: SyncRunRepository,
{
    pub fn new(repo: S, fallback: Duration) -> Self {
        Self { repo, fallback }
    }

    /// Newest `success` finish for `entity`, checking the current run name
    /// first and then each historical name in order.
    pub async fn last_successful_sync(
        &self,
        entity: EntityType,
    ) -> HubsyncResult<Option<(DateTime<Utc>, &'static str)>> {
        let names = std::iter::once(entity.run_name()).chain(entity.legacy_run_names().iter().copied());

        for name in names {
            if let Some(ts) = self.repo.last_success_finished_at(name).await? {
                return Ok(Some((ts, name)));
            }
        }
        Ok(None)
    }

    /// Lower bound for an incremental window: the watermark, or
    /// `now - fallback` on a first-ever sync.
    pub async fn since_or_fallback(
        &self,
        entity: EntityType,
        now: DateTime<Utc>,
    ) -> HubsyncResult<(DateTime<Utc>, WatermarkSource)> {
        match self.last_successful_sync(entity).await? {
            Some((ts, name)) => Ok((ts, WatermarkSource::LastSuccess(name))),
            None => Ok((now - self.fallback, WatermarkSource::Fallback)),
        }
    }
}
