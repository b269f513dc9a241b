use crate::report::finding::Finding;
use model::mapping::registry::MappingRegistry;
use serde::Serialize;

/// A detailed report on the configured field mappings.
#[derive(Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MappingReport {
    pub totals: MappingTotals,
    pub mappings: Vec<MappingRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    pub mapping_hash: String,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingTotals {
    pub mappings: usize,
    pub active: usize,
    pub hidden: usize,
    pub inactive: usize,
}

/// One mapping, in the order the engine applies them.
#[derive(Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MappingRow {
    pub id: String,
    pub source_field: String,
    pub target_field: String,
    pub transform_function: String,
    pub target_type: String,
    pub priority: i32,
    pub participates: bool,
}

impl MappingReport {
    pub fn from_registry(registry: &MappingRegistry) -> Self {
        let all = registry.all();
        let totals = MappingTotals {
            mappings: all.len(),
            active: registry.active_count(),
            hidden: all.iter().filter(|m| m.hidden).count(),
            inactive: all.iter().filter(|m| !m.active).count(),
        };

        let mappings = all
            .iter()
            .map(|m| MappingRow {
                id: m.id.clone(),
                source_field: m.source_field.clone(),
                target_field: m.target_field.clone(),
                transform_function: m.transform_function.to_string(),
                target_type: m.target_type.to_string(),
                priority: m.priority,
                participates: m.participates(),
            })
            .collect();

        let mut findings: Vec<Finding> = registry
            .diagnostics()
            .iter()
            .map(Finding::from_diagnostic)
            .collect();
        if totals.active == 0 {
            findings.push(Finding::new_empty_registry());
        }

        Self {
            totals,
            mappings,
            findings,
            mapping_hash: registry.fingerprint(),
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::mapping::field::{FieldMapping, TargetType, TransformFunction};

    #[test]
    fn counts_mappings_by_visibility() {
        let registry = MappingRegistry::new(vec![
            FieldMapping::new("a", "A", "a", TransformFunction::Identity, TargetType::Text),
            FieldMapping::new("b", "B", "b", TransformFunction::Identity, TargetType::Text)
                .hidden(),
            FieldMapping::new("c", "C", "c", TransformFunction::Identity, TargetType::Text)
                .inactive(),
        ]);
        let report = MappingReport::from_registry(&registry);

        assert_eq!(
            report.totals,
            MappingTotals {
                mappings: 3,
                active: 1,
                hidden: 1,
                inactive: 1
            }
        );
        assert!(!report.has_findings());
        assert_eq!(report.mapping_hash, registry.fingerprint());
    }

    #[test]
    fn empty_registry_is_flagged() {
        let report = MappingReport::from_registry(&MappingRegistry::default());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].code, "EMPTY_REGISTRY");
    }
}
