use crate::mapping::field::FieldMapping;
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

/// Ordered collection of field mappings.
///
/// Mappings are sorted once on construction: `priority` ascending, then
/// `target_field`, then `id`. Every iteration over the registry therefore
/// yields the same order regardless of how the table was loaded.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: Vec<FieldMapping>,
}

/// A configuration problem found in the mapping table. Never blocks a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingDiagnostic {
    pub code: &'static str,
    pub mapping_id: String,
    pub message: String,
}

pub const DIAG_DUPLICATE_ID: &str = "DUPLICATE_MAPPING_ID";
pub const DIAG_SHADOWED_TARGET: &str = "SHADOWED_TARGET";
pub const DIAG_EMPTY_FIELD: &str = "EMPTY_FIELD_NAME";

fn mapping_order(a: &FieldMapping, b: &FieldMapping) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.target_field.cmp(&b.target_field))
        .then_with(|| a.id.cmp(&b.id))
}

impl MappingRegistry {
    pub fn new(mut mappings: Vec<FieldMapping>) -> Self {
        mappings.sort_by(mapping_order);
        Self { mappings }
    }

    /// All mappings, including inactive and hidden ones.
    pub fn all(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// Mappings that take part in a transform pass.
    pub fn active(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(|m| m.participates())
    }

    pub fn get(&self, id: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    pub fn by_source<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldMapping> {
        self.active().filter(move |m| m.source_field == field)
    }

    /// The first active mapping writing `field`; later ones are shadowed.
    pub fn by_target(&self, field: &str) -> Option<&FieldMapping> {
        self.active().find(|m| m.target_field == field)
    }

    pub fn consumes_source(&self, field: &str) -> bool {
        self.by_source(field).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn diagnostics(&self) -> Vec<MappingDiagnostic> {
        let mut out = Vec::new();

        let mut seen_ids = HashSet::with_capacity(self.mappings.len());
        for m in &self.mappings {
            if !seen_ids.insert(m.id.as_str()) {
                out.push(MappingDiagnostic {
                    code: DIAG_DUPLICATE_ID,
                    mapping_id: m.id.clone(),
                    message: format!("Mapping id '{}' is used more than once", m.id),
                });
            }
            if m.source_field.trim().is_empty() || m.target_field.trim().is_empty() {
                out.push(MappingDiagnostic {
                    code: DIAG_EMPTY_FIELD,
                    mapping_id: m.id.clone(),
                    message: format!("Mapping '{}' has an empty field name", m.id),
                });
            }
        }

        let mut winners: HashMap<&str, &str> = HashMap::new();
        for m in self.active() {
            match winners.get(m.target_field.as_str()) {
                Some(winner) => out.push(MappingDiagnostic {
                    code: DIAG_SHADOWED_TARGET,
                    mapping_id: m.id.clone(),
                    message: format!(
                        "Target field '{}' is already written by mapping '{}'",
                        m.target_field, winner
                    ),
                }),
                None => {
                    winners.insert(&m.target_field, &m.id);
                }
            }
        }

        out
    }

    /// Stable md5 hex digest of the active mapping set, in registry order.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Minimal<'a> {
            id: &'a str,
            source: &'a str,
            target: &'a str,
            function: &'a str,
            target_type: &'a str,
        }

        let minimal: Vec<_> = self
            .active()
            .map(|m| Minimal {
                id: &m.id,
                source: &m.source_field,
                target: &m.target_field,
                function: m.transform_function.as_str(),
                target_type: m.target_type.as_str(),
            })
            .collect();

        let json = serde_json::to_vec(&minimal).unwrap_or_default();
        format!("{:x}", md5::compute(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::field::{TargetType, TransformFunction};

    fn mapping(id: &str, source: &str, target: &str, priority: i32) -> FieldMapping {
        FieldMapping::new(
            id,
            source,
            target,
            TransformFunction::Identity,
            TargetType::Text,
        )
        .with_priority(priority)
    }

    #[test]
    fn orders_by_priority_then_target_then_id() {
        let registry = MappingRegistry::new(vec![
            mapping("c", "S3", "zeta", 1),
            mapping("b", "S2", "alpha", 1),
            mapping("a", "S1", "name", 0),
            mapping("d", "S4", "alpha", 1),
        ]);

        let ids: Vec<_> = registry.active().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn order_does_not_depend_on_input_order() {
        let forward = MappingRegistry::new(vec![
            mapping("x", "A", "t1", 5),
            mapping("y", "B", "t0", 5),
        ]);
        let backward = MappingRegistry::new(vec![
            mapping("y", "B", "t0", 5),
            mapping("x", "A", "t1", 5),
        ]);
        assert_eq!(forward.all(), backward.all());
        assert_eq!(forward.fingerprint(), backward.fingerprint());
    }

    #[test]
    fn skips_inactive_and_hidden_mappings() {
        let registry = MappingRegistry::new(vec![
            mapping("a", "A", "a", 0),
            mapping("b", "B", "b", 0).inactive(),
            mapping("c", "C", "c", 0).hidden(),
        ]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.active_count(), 1);
        assert!(registry.consumes_source("A"));
        assert!(!registry.consumes_source("B"));
        assert!(registry.by_target("c").is_none());
        assert!(registry.get("c").is_some());
    }

    #[test]
    fn reports_shadowed_targets_and_duplicate_ids() {
        let registry = MappingRegistry::new(vec![
            mapping("first", "A", "phone", 0),
            mapping("second", "B", "phone", 1),
            mapping("first", "C", "other", 2),
        ]);

        let codes: Vec<_> = registry.diagnostics().iter().map(|d| d.code).collect();
        assert!(codes.contains(&DIAG_SHADOWED_TARGET));
        assert!(codes.contains(&DIAG_DUPLICATE_ID));
        assert_eq!(registry.by_target("phone").unwrap().id, "first");
    }
}
