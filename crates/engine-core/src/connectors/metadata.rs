use std::collections::HashMap;

/// Read-only cache of remote field titles and list item labels. Used for
/// display only; never consulted by the sync transform.
pub trait FieldMetadata: Send + Sync {
    /// Human title of a field, falling back to the field id.
    fn field_title(&self, field_id: &str) -> String;

    /// Label of a list/enum item given its raw id.
    fn list_item_label(&self, field_id: &str, raw_value: &str) -> Option<String>;
}

/// Metadata with no titles or labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl FieldMetadata for NoMetadata {
    fn field_title(&self, field_id: &str) -> String {
        field_id.to_string()
    }

    fn list_item_label(&self, _field_id: &str, _raw_value: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
struct FieldEntry {
    title: Option<String>,
    items: HashMap<String, String>,
}

/// In-memory metadata snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticFieldMetadata {
    fields: HashMap<String, FieldEntry>,
}

impl StaticFieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, field_id: &str, title: &str) -> Self {
        self.fields.entry(field_id.to_string()).or_default().title = Some(title.to_string());
        self
    }

    pub fn with_item(mut self, field_id: &str, raw: &str, label: &str) -> Self {
        self.fields
            .entry(field_id.to_string())
            .or_default()
            .items
            .insert(raw.to_string(), label.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldMetadata for StaticFieldMetadata {
    fn field_title(&self, field_id: &str) -> String {
        self.fields
            .get(field_id)
            .and_then(|f| f.title.clone())
            .unwrap_or_else(|| field_id.to_string())
    }

    fn list_item_label(&self, field_id: &str, raw_value: &str) -> Option<String> {
        self.fields
            .get(field_id)
            .and_then(|f| f.items.get(raw_value).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_field_id() {
        let meta = StaticFieldMetadata::new()
            .with_title("SOURCE_ID", "Source")
            .with_item("SOURCE_ID", "42", "Website");

        assert_eq!(meta.field_title("SOURCE_ID"), "Source");
        assert_eq!(meta.field_title("UF_CRM_X"), "UF_CRM_X");
        assert_eq!(
            meta.list_item_label("SOURCE_ID", "42").as_deref(),
            Some("Website")
        );
        assert_eq!(meta.list_item_label("SOURCE_ID", "7"), None);
    }
}
