use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::dictionary;
use crate::records::document::Document;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Contact,
    Deal,
    Call,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [Self::Contact, Self::Deal, Self::Call];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Deal => "deal",
            Self::Call => "call",
        }
    }

    /// Upstream collection segment, e.g. `/crm/v3/objects/deals`.
    pub fn object_path(&self) -> &'static str {
        match self {
            Self::Contact => "contacts",
            Self::Deal => "deals",
            Self::Call => "calls",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Contact => "crm_contacts",
            Self::Deal => "crm_deals",
            Self::Call => "crm_calls",
        }
    }

    /// Name recorded in `sync_runs.entity_type` for new runs.
    pub fn run_name(&self) -> &'static str {
        self.object_path()
    }

    /// Names earlier deployments recorded runs under, newest first.
    pub fn legacy_run_names(&self) -> &'static [&'static str] {
        match self {
            Self::Contact => &["hubspot_contacts", "contacts_sync"],
            Self::Deal => &["hubspot_deals", "deals_sync"],
            Self::Call => &["hubspot_calls", "calls_sync"],
        }
    }

    /// Upstream property holding the last-modified timestamp.
    pub fn modified_property(&self) -> &'static str {
        match self {
            Self::Contact => "lastmodifieddate",
            Self::Deal | Self::Call => "hs_lastmodifieddate",
        }
    }

    /// Upstream property holding the creation timestamp.
    pub fn created_property(&self) -> &'static str {
        match self {
            Self::Contact | Self::Deal => "createdate",
            Self::Call => "hs_createdate",
        }
    }

    /// Calls are never revised upstream once logged, so they are written
    /// insert-or-ignore instead of merged.
    pub fn is_append_only(&self) -> bool {
        matches!(self, Self::Call)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        dictionary::fields_for(*self)
    }

    /// Every property requested upstream: dictionary columns first, then
    /// document-only extras.
    pub fn requested_properties(&self) -> Vec<&'static str> {
        let mut props: Vec<&'static str> = self.fields().iter().map(|f| f.property).collect();
        for extra in dictionary::document_only_properties(*self) {
            if !props.contains(extra) {
                props.push(extra);
            }
        }
        props
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "contact" | "contacts" => Ok(Self::Contact),
            "deal" | "deals" => Ok(Self::Deal),
            "call" | "calls" => Ok(Self::Call),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
}

impl ColumnKind {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "bigint",
            Self::Decimal => "double precision",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamptz",
        }
    }
}

/// Promotes one upstream property to a typed warehouse column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub property: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl FieldSpec {
    pub const fn new(property: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        Self {
            property,
            column,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Decimal(Option<f64>),
    Boolean(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
}

impl ColumnValue {
    pub fn null_of(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => Self::Text(None),
            ColumnKind::Integer => Self::Integer(None),
            ColumnKind::Decimal => Self::Decimal(None),
            ColumnKind::Boolean => Self::Boolean(None),
            ColumnKind::Timestamp => Self::Timestamp(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Text(v) => v.is_none(),
            Self::Integer(v) => v.is_none(),
            Self::Decimal(v) => v.is_none(),
            Self::Boolean(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
        }
    }
}

/// One destination row. `columns` follows the entity's field dictionary order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRow {
    pub id: String,
    pub columns: Vec<ColumnValue>,
    pub document: Document,
    pub last_synced_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub sync_run_id: Uuid,
}

impl WarehouseRow {
    /// Look up a typed column by its warehouse column name.
    pub fn column(&self, entity: EntityType, name: &str) -> Option<&ColumnValue> {
        entity
            .fields()
            .iter()
            .position(|f| f.column == name)
            .and_then(|idx| self.columns.get(idx))
    }
}
