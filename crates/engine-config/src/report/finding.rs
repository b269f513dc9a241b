use model::mapping::registry::MappingDiagnostic;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Warning,
    Error,
}

/// What a report-level finding is about.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FindingKind {
    Mapping,
    SampleData,
}

/// Report-level issue, as opposed to a per-field issue of one record.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Finding {
    /// Stable, machine-readable code.
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub kind: FindingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Finding {
    fn mapping_warning(code: &str, message: String, suggestion: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            severity: Severity::Warning,
            kind: FindingKind::Mapping,
            suggestion: Some(suggestion),
        }
    }

    /// Registry diagnostics never block a sync, so they surface as warnings.
    pub fn from_diagnostic(diag: &MappingDiagnostic) -> Self {
        Self::mapping_warning(
            diag.code,
            diag.message.clone(),
            format!("Review mapping `{}` in the mapping table.", diag.mapping_id),
        )
    }

    pub fn new_empty_registry() -> Self {
        Self::mapping_warning(
            "EMPTY_REGISTRY",
            "No active mappings; imported records would carry no fields.".to_string(),
            "Activate at least one mapping or unhide it.".to_string(),
        )
    }

    pub fn new_sample_decode(index: usize, reason: &str) -> Self {
        Self {
            code: "SAMPLE_DECODE".to_string(),
            message: format!("Sample #{index} could not be decoded: {reason}"),
            severity: Severity::Error,
            kind: FindingKind::SampleData,
            suggestion: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
