use engine_core::connectors::metadata::FieldMetadata;
use serde_json::Value as Json;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfo {
    pub title: String,
    pub kind: String,
    /// `statusType` of `crm_status` fields; their items live in `crm.status.list`.
    pub status_type: Option<String>,
    pub items: HashMap<String, String>,
}

/// Snapshot of `crm.<entity>.fields`, used for display only.
#[derive(Debug, Clone, Default)]
pub struct BitrixFieldCache {
    fields: HashMap<String, FieldInfo>,
}

impl BitrixFieldCache {
    /// Reads the `result` object of a `crm.<entity>.fields` response.
    pub fn from_fields_result(result: &Json) -> Self {
        let Some(map) = result.as_object() else {
            return Self::default();
        };

        let fields = map
            .iter()
            .map(|(id, meta)| {
                let text = |key: &str| {
                    meta.get(key)
                        .and_then(Json::as_str)
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string)
                };
                // User fields carry their code in `title`; the human name is in the labels.
                let title = text("listLabel")
                    .or_else(|| text("formLabel"))
                    .or_else(|| text("title"))
                    .unwrap_or_else(|| id.clone());

                let items = meta
                    .get("items")
                    .and_then(Json::as_array)
                    .map(|items| items.iter().filter_map(item_pair).collect())
                    .unwrap_or_default();

                let info = FieldInfo {
                    title,
                    kind: text("type").unwrap_or_default(),
                    status_type: text("statusType"),
                    items,
                };
                (id.clone(), info)
            })
            .collect();

        Self { fields }
    }

    /// `(field id, status type)` of every `crm_status` field.
    pub fn status_fields(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .fields
            .iter()
            .filter_map(|(id, f)| f.status_type.clone().map(|t| (id.clone(), t)))
            .collect();
        out.sort();
        out
    }

    /// Adds items read from `crm.status.list` to a field.
    pub fn add_status_items(&mut self, field_id: &str, result: &Json) {
        let Some(field) = self.fields.get_mut(field_id) else {
            return;
        };
        let Some(rows) = result.as_array() else {
            return;
        };
        for row in rows {
            let id = row.get("STATUS_ID").and_then(Json::as_str);
            let name = row.get("NAME").and_then(Json::as_str);
            if let (Some(id), Some(name)) = (id, name) {
                field.items.insert(id.to_string(), name.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn item_pair(item: &Json) -> Option<(String, String)> {
    let id = match item.get("ID")? {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        _ => return None,
    };
    let value = item.get("VALUE")?.as_str()?.to_string();
    Some((id, value))
}

impl FieldMetadata for BitrixFieldCache {
    fn field_title(&self, field_id: &str) -> String {
        self.fields
            .get(field_id)
            .map(|f| f.title.clone())
            .unwrap_or_else(|| field_id.to_string())
    }

    /// Multi-value fields arrive as JSON arrays; each id is labelled and the
    /// labels joined. `None` unless every id has a label.
    fn list_item_label(&self, field_id: &str, raw_value: &str) -> Option<String> {
        let field = self.fields.get(field_id)?;
        if let Some(label) = field.items.get(raw_value) {
            return Some(label.clone());
        }

        let Ok(Json::Array(ids)) = serde_json::from_str::<Json>(raw_value) else {
            return None;
        };
        let labels = ids
            .iter()
            .map(|id| match id {
                Json::String(s) => field.items.get(s).cloned(),
                Json::Number(n) => field.items.get(&n.to_string()).cloned(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        (!labels.is_empty()).then(|| labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> BitrixFieldCache {
        BitrixFieldCache::from_fields_result(&json!({
            "TITLE": { "type": "string", "title": "Lead name" },
            "SOURCE_ID": { "type": "crm_status", "title": "Source", "statusType": "SOURCE" },
            "UF_CRM_INTEREST": {
                "type": "enumeration",
                "title": "UF_CRM_INTEREST",
                "listLabel": "Interest",
                "items": [ { "ID": "44", "VALUE": "Cars" }, { "ID": 46, "VALUE": "Boats" } ]
            }
        }))
    }

    #[test]
    fn prefers_labels_over_user_field_codes() {
        let cache = cache();
        assert_eq!(cache.field_title("TITLE"), "Lead name");
        assert_eq!(cache.field_title("UF_CRM_INTEREST"), "Interest");
        assert_eq!(cache.field_title("UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn resolves_single_and_multi_value_items() {
        let cache = cache();
        assert_eq!(
            cache.list_item_label("UF_CRM_INTEREST", "44").as_deref(),
            Some("Cars")
        );
        assert_eq!(
            cache.list_item_label("UF_CRM_INTEREST", r#"["44",46]"#).as_deref(),
            Some("Cars, Boats")
        );
        assert_eq!(cache.list_item_label("UF_CRM_INTEREST", r#"["44","99"]"#), None);
        assert_eq!(cache.list_item_label("TITLE", "44"), None);
    }

    #[test]
    fn status_items_are_merged_in() {
        let mut cache = cache();
        assert_eq!(
            cache.status_fields(),
            vec![("SOURCE_ID".to_string(), "SOURCE".to_string())]
        );
        cache.add_status_items(
            "SOURCE_ID",
            &json!([{ "STATUS_ID": "WEB", "NAME": "Website" }, { "STATUS_ID": "CALL", "NAME": "Call" }]),
        );
        assert_eq!(
            cache.list_item_label("SOURCE_ID", "WEB").as_deref(),
            Some("Website")
        );
    }
}
