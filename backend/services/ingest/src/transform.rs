use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use hubsync_db::records::document::{DocValue, Document};
use hubsync_db::records::models::{ColumnKind, ColumnValue, EntityType, WarehouseRow};

use crate::crm::models::SourceRecord;

/// Map one upstream record to its warehouse row.
///
/// Dictionary properties become typed columns; the full property map is
/// copied verbatim into the document. Values that do not coerce cleanly
/// become null.
pub fn to_warehouse_row(
    entity: EntityType,
    record: &SourceRecord,
    run_id: Uuid,
    synced_at: DateTime<Utc>,
) -> WarehouseRow {
    let columns = typed_columns(entity, &record.properties);

    let last_updated_at = record.updated_at.or_else(|| {
        record
            .properties
            .get(entity.modified_property())
            .and_then(parse_timestamp)
    });

    WarehouseRow {
        id: record.id.clone(),
        columns,
        document: record.properties.clone(),
        last_synced_at: synced_at,
        last_updated_at,
        sync_run_id: run_id,
    }
}

/// Collapse repeated identifiers, keeping first-seen order.
///
/// The later delivery wins on conflicting properties; properties only the
/// earlier one carried are kept.
pub fn collapse_duplicates(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<SourceRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.id) {
            Some(&pos) => {
                let existing = &mut out[pos];
                existing.properties.merge_from(&record.properties);
                existing.created_at = record.created_at.or(existing.created_at);
                existing.updated_at = record.updated_at.or(existing.updated_at);
            }
            None => {
                index.insert(record.id.clone(), out.len());
                out.push(record);
            }
        }
    }

    out
}

/// Dictionary columns for `entity`, read from a property document.
pub fn typed_columns(entity: EntityType, document: &Document) -> Vec<ColumnValue> {
    entity
        .fields()
        .iter()
        .map(|field| coerce(document.get(field.property), field.kind))
        .collect()
}

fn coerce(value: Option<&DocValue>, kind: ColumnKind) -> ColumnValue {
    let value = value.filter(|v| !is_blank(v));
    match kind {
        ColumnKind::Text => ColumnValue::Text(value.and_then(to_text)),
        ColumnKind::Integer => ColumnValue::Integer(value.and_then(parse_integer)),
        ColumnKind::Decimal => ColumnValue::Decimal(value.and_then(parse_decimal)),
        ColumnKind::Boolean => ColumnValue::Boolean(value.and_then(parse_bool)),
        ColumnKind::Timestamp => ColumnValue::Timestamp(value.and_then(parse_timestamp)),
    }
}

fn is_blank(value: &DocValue) -> bool {
    match value {
        DocValue::Null => true,
        DocValue::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn to_text(value: &DocValue) -> Option<String> {
    match value {
        DocValue::Null => None,
        DocValue::Text(s) => Some(s.clone()),
        DocValue::Bool(b) => Some(b.to_string()),
        DocValue::Number(n) => Some(n.to_string()),
    }
}

fn parse_integer(value: &DocValue) -> Option<i64> {
    match value {
        DocValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        DocValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_decimal(value: &DocValue) -> Option<f64> {
    let parsed = match value {
        DocValue::Number(n) => n.as_f64(),
        DocValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn parse_bool(value: &DocValue) -> Option<bool> {
    match value {
        DocValue::Bool(b) => Some(*b),
        DocValue::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        DocValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        DocValue::Null => None,
    }
}

/// RFC 3339, epoch milliseconds, or a bare `YYYY-MM-DD`.
fn parse_timestamp(value: &DocValue) -> Option<DateTime<Utc>> {
    match value {
        DocValue::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        DocValue::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                return s
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubsync_db::records::document::Document;

    fn record(id: &str, props: serde_json::Value) -> SourceRecord {
        SourceRecord {
            id: id.to_string(),
            properties: Document::from_json(props),
            created_at: None,
            updated_at: None,
        }
    }

    fn text(s: &str) -> DocValue {
        DocValue::Text(s.to_string())
    }

    #[test]
    fn deal_columns_are_typed() {
        let rec = record(
            "D1",
            serde_json::json!({
                "dealname": "Renewal",
                "amount": "2500.50",
                "dealstage": "closedwon",
                "closedate": "2026-10-01T00:00:00Z",
                "hs_is_closed_won": "true",
                "hs_is_closed": "1",
                "hs_deal_stage_probability": "",
                "hs_lastmodifieddate": "1760000000000"
            }),
        );
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        let row = to_warehouse_row(EntityType::Deal, &rec, run_id, now);

        assert_eq!(row.id, "D1");
        assert_eq!(row.sync_run_id, run_id);
        assert_eq!(row.last_synced_at, now);
        assert_eq!(row.columns.len(), EntityType::Deal.fields().len());
        assert_eq!(
            row.column(EntityType::Deal, "deal_name"),
            Some(&ColumnValue::Text(Some("Renewal".into())))
        );
        assert_eq!(
            row.column(EntityType::Deal, "amount"),
            Some(&ColumnValue::Decimal(Some(2500.5)))
        );
        assert_eq!(
            row.column(EntityType::Deal, "is_closed_won"),
            Some(&ColumnValue::Boolean(Some(true)))
        );
        assert_eq!(
            row.column(EntityType::Deal, "is_closed"),
            Some(&ColumnValue::Boolean(Some(true)))
        );
        assert_eq!(
            row.column(EntityType::Deal, "stage_probability"),
            Some(&ColumnValue::Decimal(None))
        );
        assert_eq!(
            row.last_updated_at,
            Utc.timestamp_millis_opt(1_760_000_000_000).single()
        );
    }

    #[test]
    fn missing_and_empty_values_become_null_never_empty_string() {
        let rec = record("C1", serde_json::json!({ "email": "", "phone": null }));
        let row = to_warehouse_row(EntityType::Contact, &rec, Uuid::new_v4(), Utc::now());

        assert!(row.columns.iter().all(ColumnValue::is_null));
        assert_eq!(
            row.column(EntityType::Contact, "email"),
            Some(&ColumnValue::Text(None))
        );
    }

    #[test]
    fn document_keeps_unmapped_properties_verbatim() {
        let rec = record(
            "C2",
            serde_json::json!({ "email": "a@example.com", "favourite_colour": "teal", "phone": "" }),
        );
        let row = to_warehouse_row(EntityType::Contact, &rec, Uuid::new_v4(), Utc::now());

        assert_eq!(row.document, rec.properties);
        assert_eq!(row.document.get("favourite_colour"), Some(&text("teal")));
        assert_eq!(row.document.get("phone"), Some(&text("")));
    }

    #[test]
    fn malformed_numbers_are_null() {
        assert_eq!(
            coerce(Some(&text("12abc")), ColumnKind::Decimal),
            ColumnValue::Decimal(None)
        );
        assert_eq!(
            coerce(Some(&text("NaN")), ColumnKind::Decimal),
            ColumnValue::Decimal(None)
        );
        assert_eq!(
            coerce(Some(&text("1.5")), ColumnKind::Integer),
            ColumnValue::Integer(None)
        );
        assert_eq!(
            coerce(Some(&text("42.0")), ColumnKind::Integer),
            ColumnValue::Integer(Some(42))
        );
        assert_eq!(
            coerce(Some(&text(" 17 ")), ColumnKind::Integer),
            ColumnValue::Integer(Some(17))
        );
    }

    #[test]
    fn boolean_coercion() {
        for (raw, expected) in [
            ("true", Some(true)),
            ("TRUE", Some(true)),
            ("1", Some(true)),
            ("false", Some(false)),
            ("0", Some(false)),
            ("yes", None),
        ] {
            assert_eq!(
                coerce(Some(&text(raw)), ColumnKind::Boolean),
                ColumnValue::Boolean(expected),
                "input {raw}"
            );
        }
        assert_eq!(
            coerce(Some(&DocValue::Bool(false)), ColumnKind::Boolean),
            ColumnValue::Boolean(Some(false))
        );
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let millis = expected.timestamp_millis().to_string();
        for raw in [
            "2026-10-01T00:00:00Z",
            "2026-10-01T00:00:00.000Z",
            "2026-10-01",
            millis.as_str(),
        ] {
            assert_eq!(
                coerce(Some(&text(raw)), ColumnKind::Timestamp),
                ColumnValue::Timestamp(Some(expected)),
                "input {raw}"
            );
        }
        assert_eq!(
            coerce(Some(&text("yesterday")), ColumnKind::Timestamp),
            ColumnValue::Timestamp(None)
        );
    }

    #[test]
    fn updated_at_prefers_envelope_timestamp() {
        let envelope = Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap();
        let mut rec = record("X", serde_json::json!({ "lastmodifieddate": "2026-01-01" }));
        rec.updated_at = Some(envelope);

        let row = to_warehouse_row(EntityType::Contact, &rec, Uuid::new_v4(), Utc::now());
        assert_eq!(row.last_updated_at, Some(envelope));
    }

    #[test]
    fn duplicates_collapse_with_later_values_winning() {
        let records = vec![
            record("1", serde_json::json!({ "a": "1", "b": "2" })),
            record("2", serde_json::json!({ "a": "x" })),
            record("1", serde_json::json!({ "b": "3", "c": "4" })),
        ];

        let collapsed = collapse_duplicates(records);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].id, "1");
        assert_eq!(collapsed[1].id, "2");

        let doc = &collapsed[0].properties;
        assert_eq!(doc.get("a"), Some(&text("1")));
        assert_eq!(doc.get("b"), Some(&text("3")));
        assert_eq!(doc.get("c"), Some(&text("4")));
    }
}
