use crate::transform::record::RecordMapper;
use engine_config::report::{
    finding::Finding,
    preview::{PreviewField, PreviewItem, PreviewReport, Snapshot},
};
use engine_core::connectors::metadata::FieldMetadata;
use model::{
    mapping::{field::Direction, registry::MappingRegistry},
    records::record::{Fields, Record},
};
use tracing::{debug, info};

/// Dry run of the import pipeline over sample records. Writes nothing.
pub struct SyncPreviewSimulator<'a> {
    registry: &'a MappingRegistry,
    metadata: &'a dyn FieldMetadata,
    /// Remote field carrying the record id; never reported as unmapped.
    id_field: Option<String>,
}

impl<'a> SyncPreviewSimulator<'a> {
    pub fn new(registry: &'a MappingRegistry, metadata: &'a dyn FieldMetadata) -> Self {
        Self {
            registry,
            metadata,
            id_field: None,
        }
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn preview(&self, direction: Direction, samples: &[Record]) -> Vec<PreviewItem> {
        let mapper = RecordMapper::new(self.registry);
        samples
            .iter()
            .map(|record| {
                let mapped = mapper.map(direction, record);

                let mut warnings: Vec<String> =
                    mapped.warnings().map(ToString::to_string).collect();
                if direction == Direction::RemoteToLocal {
                    warnings.extend(self.unmapped_fields(record));
                }
                let errors: Vec<String> = mapped.errors().map(ToString::to_string).collect();

                let (source_snapshot, target_snapshot) = match direction {
                    Direction::RemoteToLocal => {
                        (self.remote_snapshot(&record.fields), local_snapshot(&mapped.fields))
                    }
                    Direction::LocalToRemote => {
                        (local_snapshot(&record.fields), self.remote_snapshot(&mapped.fields))
                    }
                };

                debug!(
                    record_id = %record.id,
                    warnings = warnings.len(),
                    errors = errors.len(),
                    "Previewed record"
                );

                PreviewItem {
                    record_id: record.id.clone(),
                    source_snapshot,
                    target_snapshot,
                    warnings,
                    errors,
                }
            })
            .collect()
    }

    /// Previews raw JSON samples. Samples that are not objects or have no
    /// id become findings instead of items.
    pub fn preview_json(
        &self,
        direction: Direction,
        id_field: &str,
        samples: Vec<serde_json::Value>,
    ) -> PreviewReport {
        let mut findings = Vec::new();
        let mut records = Vec::with_capacity(samples.len());
        for (index, sample) in samples.into_iter().enumerate() {
            match Record::from_json_object(id_field, sample) {
                Ok(record) => records.push(record),
                Err(e) => findings.push(Finding::new_sample_decode(index, &e.to_string())),
            }
        }
        self.report_with(direction, &records, findings)
    }

    pub fn report(&self, direction: Direction, samples: &[Record]) -> PreviewReport {
        self.report_with(direction, samples, Vec::new())
    }

    fn report_with(
        &self,
        direction: Direction,
        samples: &[Record],
        mut findings: Vec<Finding>,
    ) -> PreviewReport {
        findings.extend(self.registry.diagnostics().iter().map(Finding::from_diagnostic));
        let items = self.preview(direction, samples);
        let report = PreviewReport::new(direction, self.registry.fingerprint(), items, findings);
        info!(
            run_id = %report.run_id,
            records = report.totals.records,
            with_errors = report.totals.with_errors,
            "Preview finished"
        );
        report
    }

    fn unmapped_fields(&self, record: &Record) -> Vec<String> {
        record
            .fields
            .keys()
            .filter(|field| self.id_field.as_deref() != Some(field.as_str()))
            .filter(|field| !self.registry.consumes_source(field))
            .map(|field| format!("unmapped field '{field}'"))
            .collect()
    }

    fn remote_snapshot(&self, fields: &Fields) -> Snapshot {
        fields
            .iter()
            .map(|(name, raw)| {
                let label = raw
                    .to_text()
                    .and_then(|text| self.metadata.list_item_label(name, &text));
                let title = self.metadata.field_title(name);
                (name.clone(), PreviewField::new(title, raw, label))
            })
            .collect()
    }
}

fn local_snapshot(fields: &Fields) -> Snapshot {
    fields
        .iter()
        .map(|(name, raw)| (name.clone(), PreviewField::new(name.clone(), raw, None)))
        .collect()
}
