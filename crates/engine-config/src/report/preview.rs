use crate::report::finding::Finding;
use chrono::{DateTime, Utc};
use model::{core::value::Value, mapping::field::Direction};
use serde::Serialize;
use std::collections::BTreeMap;

/// One field of a snapshot. `raw` is always the stored value; `label` is
/// the display text of a list item, when the metadata cache knows one.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PreviewField {
    pub title: String,
    pub raw: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PreviewField {
    pub fn new(title: impl Into<String>, raw: &Value, label: Option<String>) -> Self {
        Self {
            title: title.into(),
            raw: raw.to_json(),
            label,
        }
    }
}

pub type Snapshot = BTreeMap<String, PreviewField>;

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub record_id: String,
    pub source_snapshot: Snapshot,
    pub target_snapshot: Snapshot,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl PreviewItem {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTotals {
    pub records: usize,
    pub with_warnings: usize,
    pub with_errors: usize,
}

/// Result of a dry run over sample records.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub run_id: String,
    pub direction: Direction,
    pub mapping_hash: String,
    pub generated_at: DateTime<Utc>,
    pub totals: PreviewTotals,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    pub items: Vec<PreviewItem>,
}

impl PreviewReport {
    pub fn new(
        direction: Direction,
        mapping_hash: String,
        items: Vec<PreviewItem>,
        findings: Vec<Finding>,
    ) -> Self {
        let totals = PreviewTotals {
            records: items.len(),
            with_warnings: items.iter().filter(|i| i.has_warnings()).count(),
            with_errors: items.iter().filter(|i| i.has_errors()).count(),
        };
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            direction,
            mapping_hash,
            generated_at: Utc::now(),
            totals,
            findings,
            items,
        }
    }

    /// No record failed and no finding is an error. Warnings are allowed.
    pub fn is_clean(&self) -> bool {
        self.totals.with_errors == 0 && !self.findings.iter().any(Finding::is_error)
    }
}
