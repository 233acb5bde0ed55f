use chrono::{DateTime, Utc};
use hubsync_db::records::models::EntityType;
use serde::Serialize;

/// Time bounds for one fetch. No bounds at all means "every record".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl FetchWindow {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    Gte,
    Lte,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: FilterOperator,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchSort {
    pub property_name: String,
    pub direction: String,
}

/// Body of `POST /crm/v3/objects/{object}/search`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub properties: Vec<String>,
    pub sorts: Vec<SearchSort>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Build the changed-or-created search for `window`.
///
/// Filter groups are OR'ed upstream: one group bounds the last-modified
/// property, the other the creation property. Lower bounds are inclusive.
pub fn build_search_request(
    entity: EntityType,
    properties: &[&str],
    window: &FetchWindow,
    page_size: u32,
) -> SearchRequest {
    let filter_groups = [entity.modified_property(), entity.created_property()]
        .into_iter()
        .map(|property| FilterGroup {
            filters: bound_filters(property, window),
        })
        .filter(|group| !group.filters.is_empty())
        .collect();

    SearchRequest {
        filter_groups,
        properties: properties.iter().map(|p| p.to_string()).collect(),
        sorts: vec![SearchSort {
            property_name: entity.modified_property().to_string(),
            direction: "ASCENDING".to_string(),
        }],
        limit: page_size,
        after: None,
    }
}

fn bound_filters(property: &str, window: &FetchWindow) -> Vec<Filter> {
    let lower = window.since.map(|ts| Filter {
        property_name: property.to_string(),
        operator: FilterOperator::Gte,
        value: epoch_millis(ts),
    });
    let upper = window.until.map(|ts| Filter {
        property_name: property.to_string(),
        operator: FilterOperator::Lte,
        value: epoch_millis(ts),
    });
    lower.into_iter().chain(upper).collect()
}

fn epoch_millis(ts: DateTime<Utc>) -> String {
    ts.timestamp_millis().to_string()
}
