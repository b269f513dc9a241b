use crate::{error::ImportError, transform::record::RecordMapper};
use engine_core::{
    connectors::{call_with_retry, local::LocalStore, remote::RemoteCrm},
    retry::RetryPolicy,
};
use model::mapping::{field::Direction, registry::MappingRegistry};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Summary of one successfully imported record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRecord {
    pub record_id: String,
    pub fields_written: usize,
    pub warnings: usize,
    pub field_errors: usize,
}

/// Fetches a remote record, maps it inbound and upserts it locally.
///
/// Fields that fail to convert are left out of the upsert; the record only
/// fails when nothing at all could be converted.
#[derive(Clone)]
pub struct RecordImporter {
    remote: Arc<dyn RemoteCrm>,
    local: Arc<dyn LocalStore>,
    registry: Arc<MappingRegistry>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl RecordImporter {
    pub fn new(
        remote: Arc<dyn RemoteCrm>,
        local: Arc<dyn LocalStore>,
        registry: Arc<MappingRegistry>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            local,
            registry,
            retry,
            call_timeout,
        }
    }

    pub async fn import(&self, id: &str) -> Result<ImportedRecord, ImportError> {
        let remote = self.remote.as_ref();
        let record = call_with_retry(&self.retry, self.call_timeout, "remote.get_record", move || {
            remote.get_record(id)
        })
        .await
        .map_err(ImportError::Fetch)?;

        let mapped = RecordMapper::new(&self.registry).map(Direction::RemoteToLocal, &record);
        for issue in &mapped.issues {
            if issue.is_error() {
                warn!(record_id = id, field = %issue.field, mapping_id = %issue.mapping_id, "{}", issue.message);
            } else {
                debug!(record_id = id, field = %issue.field, mapping_id = %issue.mapping_id, "{}", issue.message);
            }
        }

        let field_errors = mapped.error_count();
        if mapped.fields.is_empty() && field_errors > 0 {
            return Err(ImportError::NothingResolved {
                errors: field_errors,
            });
        }

        let summary = ImportedRecord {
            record_id: id.to_string(),
            fields_written: mapped.fields.len(),
            warnings: mapped.issues.len() - field_errors,
            field_errors,
        };

        let local = self.local.as_ref();
        let fields = mapped.fields;
        call_with_retry(&self.retry, self.call_timeout, "local.upsert", move || {
            local.upsert(id, fields.clone())
        })
        .await
        .map_err(ImportError::Upsert)?;

        Ok(summary)
    }
}
