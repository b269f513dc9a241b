use crate::error::SettingsError;
use model::mapping::{field::FieldMapping, registry::MappingRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// On-disk form of the mapping configuration: `{ "mappings": [ ... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingTable {
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,
}

impl MappingTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            SettingsError::ReadMappingTable {
                path: path.display().to_string(),
                source,
            }
        })?;
        let table = Self::parse(&raw)?;
        info!(
            path = %path.display(),
            mappings = table.mappings.len(),
            "Loaded mapping table"
        );
        Ok(table)
    }

    pub fn parse(raw: &str) -> Result<Self, SettingsError> {
        let table: MappingTable = serde_json::from_str(raw)?;
        table.validate()?;
        Ok(table)
    }

    /// Rejects rows that cannot be applied at all. Softer problems such as
    /// shadowed targets are left to [`MappingRegistry::diagnostics`].
    pub fn validate(&self) -> Result<(), SettingsError> {
        for mapping in &self.mappings {
            if mapping.id.trim().is_empty() {
                return Err(SettingsError::InvalidMapping {
                    mapping_id: String::new(),
                    reason: "mapping id is empty".to_string(),
                });
            }
            if mapping.source_field.trim().is_empty() {
                return Err(invalid(mapping, "sourceField is empty"));
            }
            if mapping.target_field.trim().is_empty() {
                return Err(invalid(mapping, "targetField is empty"));
            }
        }
        Ok(())
    }

    pub fn into_registry(self) -> MappingRegistry {
        let registry = MappingRegistry::new(self.mappings);
        for diag in registry.diagnostics() {
            warn!(code = diag.code, mapping_id = %diag.mapping_id, "{}", diag.message);
        }
        registry
    }
}

fn invalid(mapping: &FieldMapping, reason: &str) -> SettingsError {
    SettingsError::InvalidMapping {
        mapping_id: mapping.id.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::mapping::field::TransformFunction;
    use std::io::Write;

    const TABLE: &str = r#"{
        "mappings": [
            { "id": "age", "sourceField": "UF_CRM_AGE", "targetField": "age",
              "transformFunction": "toNumber", "targetType": "integer" },
            { "id": "title", "sourceField": "TITLE", "targetField": "title",
              "targetType": "text", "priority": -1 }
        ]
    }"#;

    #[test]
    fn loads_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();

        let registry = MappingTable::load(file.path()).unwrap().into_registry();
        let ids: Vec<_> = registry.active().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["title", "age"]);
        assert_eq!(
            registry.get("age").unwrap().transform_function,
            TransformFunction::ToNumber
        );
    }

    #[test]
    fn rejects_rows_without_fields() {
        let raw = r#"{ "mappings": [ { "id": "x", "sourceField": "", "targetField": "t", "targetType": "text" } ] }"#;
        assert!(matches!(
            MappingTable::parse(raw),
            Err(SettingsError::InvalidMapping { mapping_id, .. }) if mapping_id == "x"
        ));
    }

    #[test]
    fn reports_missing_file_and_bad_json() {
        assert!(matches!(
            MappingTable::load("/definitely/not/here.json"),
            Err(SettingsError::ReadMappingTable { .. })
        ));
        assert!(matches!(
            MappingTable::parse("{ not json"),
            Err(SettingsError::ParseMappingTable(_))
        ));
    }
}
