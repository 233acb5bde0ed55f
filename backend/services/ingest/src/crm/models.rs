use chrono::{DateTime, Utc};
use hubsync_db::records::document::Document;
use serde::Deserialize;

/// One page of a CRM v3 object listing or search.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectPage {
    #[serde(default)]
    pub results: Vec<ApiObject>,
    pub paging: Option<Paging>,
}

impl ObjectPage {
    /// Continuation cursor for the next page, if any.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
            .filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPage {
    pub after: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiObject {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Upstream representation of one CRM object as handed to the transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub properties: Document,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ApiObject> for SourceRecord {
    fn from(obj: ApiObject) -> Self {
        Self {
            id: obj.id,
            properties: Document::from_json(serde_json::Value::Object(obj.properties)),
            created_at: obj.created_at,
            updated_at: obj.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubsync_db::records::document::DocValue;

    #[test]
    fn page_with_cursor_deserializes() {
        let json = serde_json::json!({
            "results": [{
                "id": "101",
                "properties": { "dealname": "Renewal", "amount": "2500", "closedate": null },
                "createdAt": "2026-09-01T10:00:00.000Z",
                "updatedAt": "2026-10-01T12:30:00.000Z",
                "archived": false
            }],
            "paging": { "next": { "after": "101", "link": "https://api.example/next" } }
        });

        let page: ObjectPage = serde_json::from_value(json).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.next_cursor(), Some("101"));
        assert!(page.results[0].updated_at.is_some());
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page: ObjectPage = serde_json::from_value(serde_json::json!({ "results": [] })).unwrap();
        assert!(page.next_cursor().is_none());

        let page: ObjectPage =
            serde_json::from_value(serde_json::json!({ "results": [], "paging": {} })).unwrap();
        assert!(page.next_cursor().is_none());
    }

    #[test]
    fn empty_after_is_treated_as_no_cursor() {
        let page: ObjectPage = serde_json::from_value(serde_json::json!({
            "results": [],
            "paging": { "next": { "after": "" } }
        }))
        .unwrap();
        assert!(page.next_cursor().is_none());
    }

    #[test]
    fn source_record_keeps_nulls_in_document() {
        let obj: ApiObject = serde_json::from_value(serde_json::json!({
            "id": "7",
            "properties": { "email": "a@example.com", "phone": null }
        }))
        .unwrap();

        let record = SourceRecord::from(obj);
        assert_eq!(record.id, "7");
        assert_eq!(record.properties.len(), 2);
        assert_eq!(record.properties.get("phone"), Some(&DocValue::Null));
        assert!(record.created_at.is_none());
    }
}
