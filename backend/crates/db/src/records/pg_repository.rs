use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::records::document::Document;
use crate::records::models::{ColumnValue, EntityType, WarehouseRow};
use crate::records::repositories::RecordRepository;
use hubsync_common::error::{HubsyncError, HubsyncResult};

#[derive(Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `insert into <table> (id, <columns>, properties, ...) ` followed by one
    /// values tuple per row.
    fn insert_values<'args>(
        entity: EntityType,
        rows: &'args [WarehouseRow],
    ) -> QueryBuilder<'args, Postgres> {
        let columns: Vec<&str> = entity.fields().iter().map(|f| f.column).collect();
        let mut qb = QueryBuilder::new(format!(
            "insert into {} (id, {}, properties, last_synced_at, last_updated_at, sync_run_id) ",
            entity.table_name(),
            columns.join(", ")
        ));

        qb.push_values(rows, |mut b, row| {
            b.push_bind(row.id.clone());
            for value in &row.columns {
                bind_column(&mut b, value);
            }
            b.push_bind(Json(row.document.clone()))
                .push_bind(row.last_synced_at)
                .push_bind(row.last_updated_at)
                .push_bind(row.sync_run_id);
        });

        qb
    }

    fn check_shape(entity: EntityType, rows: &[WarehouseRow]) -> HubsyncResult<()> {
        let expected = entity.fields().len();
        match rows.iter().find(|r| r.columns.len() != expected) {
            Some(bad) => Err(HubsyncError::Validation(format!(
                "row {} has {} columns, {} expects {expected}",
                bad.id,
                bad.columns.len(),
                entity.table_name()
            ))),
            None => Ok(()),
        }
    }
}

fn bind_column<'args>(b: &mut Separated<'_, 'args, Postgres, &'static str>, value: &ColumnValue) {
    match value {
        ColumnValue::Text(v) => b.push_bind(v.clone()),
        ColumnValue::Integer(v) => b.push_bind(*v),
        ColumnValue::Decimal(v) => b.push_bind(*v),
        ColumnValue::Boolean(v) => b.push_bind(*v),
        ColumnValue::Timestamp(v) => b.push_bind(*v),
    };
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn fetch_documents(
        &self,
        entity: EntityType,
        ids: &[String],
    ) -> HubsyncResult<HashMap<String, Document>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(&format!(
            "select id, properties from {} where id = any($1)",
            entity.table_name()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(HubsyncError::database)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("id");
                let properties: serde_json::Value = row.get("properties");
                (id, Document::from_json(properties))
            })
            .collect())
    }

    async fn upsert_rows(&self, entity: EntityType, rows: &[WarehouseRow]) -> HubsyncResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        Self::check_shape(entity, rows)?;

        let mut qb = Self::insert_values(entity, rows);
        qb.push(" on conflict (id) do update set ");
        for field in entity.fields() {
            qb.push(format!("{col} = excluded.{col}, ", col = field.column));
        }
        qb.push(format!(
            "properties = excluded.properties, \
             last_synced_at = excluded.last_synced_at, \
             last_updated_at = coalesce(excluded.last_updated_at, {table}.last_updated_at), \
             sync_run_id = excluded.sync_run_id",
            table = entity.table_name()
        ));

        qb.build()
            .execute(&self.pool)
            .await
            .map_err(HubsyncError::database)?;
        Ok(())
    }

    async fn insert_rows_ignoring_conflicts(
        &self,
        entity: EntityType,
        rows: &[WarehouseRow],
    ) -> HubsyncResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        Self::check_shape(entity, rows)?;

        let mut qb = Self::insert_values(entity, rows);
        qb.push(" on conflict (id) do nothing");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(HubsyncError::database)?;
        Ok(result.rows_affected())
    }
}
