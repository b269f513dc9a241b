use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod filters;
pub mod status;

pub use filters::JobFilters;
pub use status::{JobStage, JobStatus};

pub type JobId = String;

/// One failed record inside a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub record_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorDetail {
    pub fn new(record_id: impl Into<String>, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            record_id: record_id.into(),
            error: error.into(),
            timestamp: at,
        }
    }
}

/// Persistent state of a reconciliation run.
///
/// Counters only grow, and `synced_count + error_count` never exceeds
/// `missing_count`. The job store enforces both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationJob {
    pub id: JobId,
    pub status: JobStatus,
    pub stage: JobStage,
    pub filters: JobFilters,
    /// Unique remote ids matching the filters. Named after the CRM the
    /// engine was first built against.
    pub bitrix_total: u64,
    pub scanned_count: u64,
    pub missing_count: u64,
    pub synced_count: u64,
    pub error_count: u64,
    pub error_details: Vec<ErrorDetail>,
    /// Top-level message for a fatal failure.
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReconciliationJob {
    pub fn new(filters: JobFilters, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            stage: JobStage::Pending,
            filters,
            bitrix_total: 0,
            scanned_count: 0,
            missing_count: 0,
            synced_count: 0,
            error_count: 0,
            error_details: Vec::new(),
            failure: None,
            started_at: now,
            last_heartbeat_at: now,
            completed_at: None,
        }
    }

    /// Records that have been tried so far, successfully or not.
    pub fn attempted(&self) -> u64 {
        self.synced_count + self.error_count
    }

    pub fn is_import_finished(&self) -> bool {
        self.attempted() >= self.missing_count
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub scouter_name: Option<String>,
    pub started_after: Option<NaiveDate>,
}

impl JobQuery {
    pub fn matches(&self, job: &ReconciliationJob) -> bool {
        if let Some(status) = self.status
            && job.status != status
        {
            return false;
        }
        if let Some(name) = &self.scouter_name
            && job.filters.scouter_name.as_deref() != Some(name.as_str())
        {
            return false;
        }
        if let Some(after) = self.started_after
            && job.started_at.date_naive() < after
        {
            return false;
        }
        true
    }
}
