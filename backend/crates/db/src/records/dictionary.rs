//! Fixed upstream-property → warehouse-column dictionaries.
//!
//! Properties not listed here still land in the row's document; these lists
//! only decide which ones get a typed, indexable column.

use crate::records::models::{ColumnKind, EntityType, FieldSpec};

use ColumnKind::{Boolean, Decimal, Integer, Text, Timestamp};

const CONTACT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("email", "email", Text),
    FieldSpec::new("firstname", "first_name", Text),
    FieldSpec::new("lastname", "last_name", Text),
    FieldSpec::new("phone", "phone", Text),
    FieldSpec::new("company", "company", Text),
    FieldSpec::new("jobtitle", "job_title", Text),
    FieldSpec::new("lifecyclestage", "lifecycle_stage", Text),
    FieldSpec::new("hs_lead_status", "lead_status", Text),
    FieldSpec::new("hubspot_owner_id", "owner_id", Text),
    FieldSpec::new("createdate", "created_at_crm", Timestamp),
    FieldSpec::new("lastmodifieddate", "updated_at_crm", Timestamp),
    FieldSpec::new("num_associated_deals", "associated_deal_count", Integer),
    FieldSpec::new("hs_email_optout", "email_opt_out", Boolean),
];

const DEAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("dealname", "deal_name", Text),
    FieldSpec::new("amount", "amount", Decimal),
    FieldSpec::new("dealstage", "deal_stage", Text),
    FieldSpec::new("pipeline", "pipeline", Text),
    FieldSpec::new("closedate", "close_date", Timestamp),
    FieldSpec::new("hubspot_owner_id", "owner_id", Text),
    FieldSpec::new("createdate", "created_at_crm", Timestamp),
    FieldSpec::new("hs_lastmodifieddate", "updated_at_crm", Timestamp),
    FieldSpec::new("hs_is_closed", "is_closed", Boolean),
    FieldSpec::new("hs_is_closed_won", "is_closed_won", Boolean),
    FieldSpec::new("hs_deal_stage_probability", "stage_probability", Decimal),
];

const CALL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("hs_call_title", "title", Text),
    FieldSpec::new("hs_call_direction", "direction", Text),
    FieldSpec::new("hs_call_disposition", "disposition", Text),
    FieldSpec::new("hs_call_status", "call_status", Text),
    FieldSpec::new("hs_call_duration", "duration_ms", Integer),
    FieldSpec::new("hs_timestamp", "called_at", Timestamp),
    FieldSpec::new("hubspot_owner_id", "owner_id", Text),
    FieldSpec::new("hs_createdate", "created_at_crm", Timestamp),
    FieldSpec::new("hs_lastmodifieddate", "updated_at_crm", Timestamp),
];

const CONTACT_EXTRAS: &[&str] = &[
    "hs_object_id",
    "hs_analytics_source",
    "city",
    "country",
    "website",
];

const DEAL_EXTRAS: &[&str] = &[
    "hs_object_id",
    "description",
    "dealtype",
    "hs_forecast_amount",
    "hs_analytics_source",
];

const CALL_EXTRAS: &[&str] = &[
    "hs_object_id",
    "hs_call_body",
    "hs_call_recording_url",
    "hs_call_to_number",
    "hs_call_from_number",
];

pub fn fields_for(entity: EntityType) -> &'static [FieldSpec] {
    match entity {
        EntityType::Contact => CONTACT_FIELDS,
        EntityType::Deal => DEAL_FIELDS,
        EntityType::Call => CALL_FIELDS,
    }
}

pub fn document_only_properties(entity: EntityType) -> &'static [&'static str] {
    match entity {
        EntityType::Contact => CONTACT_EXTRAS,
        EntityType::Deal => DEAL_EXTRAS,
        EntityType::Call => CALL_EXTRAS,
    }
}

/// Column reserved for bookkeeping; dictionaries must never reuse these.
pub const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "properties",
    "last_synced_at",
    "last_updated_at",
    "sync_run_id",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn columns_are_unique_per_entity() {
        for entity in EntityType::ALL {
            let columns: HashSet<_> = fields_for(entity).iter().map(|f| f.column).collect();
            assert_eq!(columns.len(), fields_for(entity).len(), "{entity}");
        }
    }

    #[test]
    fn dictionaries_avoid_reserved_columns() {
        for entity in EntityType::ALL {
            for field in fields_for(entity) {
                assert!(
                    !RESERVED_COLUMNS.contains(&field.column),
                    "{entity}.{} collides with a bookkeeping column",
                    field.column
                );
            }
        }
    }

    #[test]
    fn deal_amount_is_decimal() {
        let amount = fields_for(EntityType::Deal)
            .iter()
            .find(|f| f.property == "amount")
            .unwrap();
        assert_eq!(amount.kind, ColumnKind::Decimal);
    }
}
