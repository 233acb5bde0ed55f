use std::collections::HashMap;

use async_trait::async_trait;

use crate::records::document::Document;
use crate::records::models::{EntityType, WarehouseRow};
use hubsync_common::error::HubsyncResult;

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Current documents for the given identifiers, in one round trip.
    /// Identifiers with no row are absent from the map.
    async fn fetch_documents(
        &self,
        entity: EntityType,
        ids: &[String],
    ) -> HubsyncResult<HashMap<String, Document>>;

    /// Insert-or-update every row keyed by id. Rows must carry already-merged
    /// documents and unique ids.
    async fn upsert_rows(&self, entity: EntityType, rows: &[WarehouseRow]) -> HubsyncResult<()>;

    /// Insert rows, leaving any existing id untouched. Returns how many were inserted.
    async fn insert_rows_ignoring_conflicts(
        &self,
        entity: EntityType,
        rows: &[WarehouseRow],
    ) -> HubsyncResult<u64>;
}
