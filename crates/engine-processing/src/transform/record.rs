use crate::transform::engine::transform_field;
use engine_config::report::finding::Severity;
use model::{
    mapping::{field::Direction, registry::MappingRegistry},
    records::record::{Fields, Record},
};
use serde::Serialize;
use std::fmt;

/// A warning or error raised for one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    pub field: String,
    pub mapping_id: String,
    pub severity: Severity,
    pub message: String,
}

impl FieldIssue {
    fn warning(field: &str, mapping_id: &str, message: String) -> Self {
        Self {
            field: field.to_string(),
            mapping_id: mapping_id.to_string(),
            severity: Severity::Warning,
            message,
        }
    }

    fn error(field: &str, mapping_id: &str, message: String) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(field, mapping_id, message)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.mapping_id, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappedRecord {
    pub id: String,
    /// Resolved output fields. Unresolved ones are left out.
    pub fields: Fields,
    pub issues: Vec<FieldIssue>,
}

impl MappedRecord {
    pub fn errors(&self) -> impl Iterator<Item = &FieldIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &FieldIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Applies every active mapping of a registry to a whole record.
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper<'a> {
    registry: &'a MappingRegistry,
}

impl<'a> RecordMapper<'a> {
    pub fn new(registry: &'a MappingRegistry) -> Self {
        Self { registry }
    }

    /// Mappings run in registry order. When several write the same output
    /// field, the first one that resolves wins and the rest are reported as
    /// shadowed.
    pub fn map(&self, direction: Direction, record: &Record) -> MappedRecord {
        let mut out = MappedRecord {
            id: record.id.clone(),
            ..Default::default()
        };

        for mapping in self.registry.active() {
            let input = mapping.input_field(direction);
            let output = mapping.output_field(direction);

            if out.fields.contains_key(output) {
                out.issues.push(FieldIssue::warning(
                    output,
                    &mapping.id,
                    format!("shadowed: '{output}' is already written by an earlier mapping"),
                ));
                continue;
            }

            let Some(raw) = record.get(input) else {
                out.issues.push(FieldIssue::warning(
                    input,
                    &mapping.id,
                    format!("missing source field '{input}'"),
                ));
                continue;
            };

            let outcome = transform_field(direction, mapping, raw);
            for warning in &outcome.warnings {
                out.issues
                    .push(FieldIssue::warning(output, &mapping.id, warning.to_string()));
            }
            for error in &outcome.errors {
                out.issues
                    .push(FieldIssue::error(input, &mapping.id, error.to_string()));
            }
            if let Some(value) = outcome.value {
                out.fields.insert(output.to_string(), value);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::value::Value,
        mapping::field::{FieldMapping, TargetType, TransformFunction},
    };

    fn registry() -> MappingRegistry {
        MappingRegistry::new(vec![
            FieldMapping::new("age", "AGE", "age", TransformFunction::ToNumber, TargetType::Integer),
            FieldMapping::new("title", "TITLE", "title", TransformFunction::ToString, TargetType::Text),
            FieldMapping::new("opened", "OPENED", "opened", TransformFunction::ToBoolean, TargetType::Boolean),
        ])
    }

    #[test]
    fn maps_remote_record_to_local_fields() {
        let registry = registry();
        let record = Record::new("7")
            .with_field("AGE", "34")
            .with_field("TITLE", "Lead")
            .with_field("OPENED", "Y");

        let mapped = RecordMapper::new(&registry).map(Direction::RemoteToLocal, &record);

        assert_eq!(mapped.fields.get("age"), Some(&Value::Int(34)));
        assert_eq!(mapped.fields.get("title"), Some(&Value::from("Lead")));
        assert_eq!(mapped.fields.get("opened"), Some(&Value::Boolean(true)));
        assert!(mapped.issues.is_empty());
    }

    #[test]
    fn bad_field_does_not_stop_the_others() {
        let registry = registry();
        let record = Record::new("8")
            .with_field("AGE", "abc")
            .with_field("TITLE", "Lead")
            .with_field("OPENED", "N");

        let mapped = RecordMapper::new(&registry).map(Direction::RemoteToLocal, &record);

        assert_eq!(mapped.error_count(), 1);
        assert!(!mapped.fields.contains_key("age"));
        assert_eq!(mapped.fields.len(), 2);
        let error = mapped.errors().next().unwrap();
        assert_eq!(error.field, "AGE");
        assert_eq!(error.mapping_id, "age");
    }

    #[test]
    fn warns_about_missing_source_fields() {
        let registry = registry();
        let record = Record::new("9").with_field("TITLE", "Only title");

        let mapped = RecordMapper::new(&registry).map(Direction::RemoteToLocal, &record);

        assert_eq!(mapped.fields.len(), 1);
        assert_eq!(mapped.warnings().count(), 2);
        assert_eq!(mapped.error_count(), 0);
    }

    #[test]
    fn later_mapping_for_same_target_is_shadowed() {
        let registry = MappingRegistry::new(vec![
            FieldMapping::new("mobile", "MOBILE", "phone", TransformFunction::ToString, TargetType::Text),
            FieldMapping::new("work", "WORK_PHONE", "phone", TransformFunction::ToString, TargetType::Text)
                .with_priority(1),
        ]);
        let record = Record::new("1")
            .with_field("MOBILE", "+100")
            .with_field("WORK_PHONE", "+200");

        let mapped = RecordMapper::new(&registry).map(Direction::RemoteToLocal, &record);

        assert_eq!(mapped.fields.get("phone"), Some(&Value::from("+100")));
        assert_eq!(mapped.warnings().next().unwrap().mapping_id, "work");
    }

    #[test]
    fn unresolved_winner_lets_the_next_mapping_fill_in() {
        let registry = MappingRegistry::new(vec![
            FieldMapping::new("a", "RAW_AGE", "age", TransformFunction::ToNumber, TargetType::Integer),
            FieldMapping::new("b", "AGE_TEXT", "age", TransformFunction::ToNumber, TargetType::Integer)
                .with_priority(1),
        ]);
        let record = Record::new("1")
            .with_field("RAW_AGE", "n/a")
            .with_field("AGE_TEXT", "41");

        let mapped = RecordMapper::new(&registry).map(Direction::RemoteToLocal, &record);
        assert_eq!(mapped.fields.get("age"), Some(&Value::Int(41)));
        assert_eq!(mapped.error_count(), 1);
    }

    #[test]
    fn local_to_remote_reads_target_fields() {
        let registry = registry();
        let record = Record::new("3")
            .with_field("age", Value::Int(34))
            .with_field("opened", Value::Boolean(false))
            .with_field("title", "Lead");

        let mapped = RecordMapper::new(&registry).map(Direction::LocalToRemote, &record);

        assert_eq!(mapped.fields.get("AGE"), Some(&Value::from("34")));
        assert_eq!(mapped.fields.get("OPENED"), Some(&Value::from("N")));
        assert!(mapped.issues.is_empty());
    }
}
