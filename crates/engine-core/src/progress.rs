use chrono::{DateTime, TimeDelta, Utc};
use model::job::{JobStage, JobStatus, ReconciliationJob};
use serde::Serialize;

/// A running job whose heartbeat is older than this is considered stalled.
pub const DEFAULT_STALL_THRESHOLD: TimeDelta = TimeDelta::minutes(3);

const LISTING_PERCENT: f64 = 10.0;
const COMPARING_PERCENT: f64 = 30.0;
const IMPORT_SPAN_PERCENT: f64 = 65.0;

/// `status == running && now - last_heartbeat_at > threshold`. Never stored.
pub fn is_stalled(job: &ReconciliationJob, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    job.status == JobStatus::Running && now - job.last_heartbeat_at > threshold
}

/// Progress of a stage given the import counters.
pub fn stage_percentage(stage: JobStage, attempted: u64, missing: u64) -> f64 {
    match stage {
        JobStage::Pending => 0.0,
        JobStage::ListingRemote => LISTING_PERCENT,
        JobStage::Comparing => COMPARING_PERCENT,
        JobStage::Importing => {
            if missing == 0 {
                return COMPARING_PERCENT + IMPORT_SPAN_PERCENT;
            }
            let ratio = (attempted as f64 / missing as f64).min(1.0);
            COMPARING_PERCENT + IMPORT_SPAN_PERCENT * ratio
        }
    }
}

/// Derived completion percentage. Completed jobs report 100; failed and
/// cancelled jobs keep the value of the stage they stopped in.
pub fn percentage(job: &ReconciliationJob) -> f64 {
    match job.status {
        JobStatus::Completed => 100.0,
        _ => stage_percentage(job.stage, job.attempted(), job.missing_count),
    }
}

/// Read-only health view of a job, with the operator actions it allows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHealth {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    pub stalled: bool,
    pub can_cancel: bool,
    pub can_terminate: bool,
    pub can_delete: bool,
    pub percentage: f64,
    pub heartbeat_age_secs: i64,
}

impl JobHealth {
    pub fn evaluate(job: &ReconciliationJob, now: DateTime<Utc>, threshold: TimeDelta) -> Self {
        let stalled = is_stalled(job, now, threshold);
        let running = job.status == JobStatus::Running;

        JobHealth {
            job_id: job.id.clone(),
            status: job.status,
            stage: job.stage,
            stalled,
            can_cancel: running && !stalled,
            can_terminate: running && stalled,
            can_delete: job.status.is_terminal(),
            percentage: percentage(job),
            heartbeat_age_secs: (now - job.last_heartbeat_at).num_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::job::JobFilters;

    fn job_with(status: JobStatus, heartbeat_age: TimeDelta, now: DateTime<Utc>) -> ReconciliationJob {
        let mut job = ReconciliationJob::new(JobFilters::default(), now - TimeDelta::hours(1));
        job.status = status;
        job.stage = JobStage::Importing;
        job.last_heartbeat_at = now - heartbeat_age;
        job
    }

    #[test]
    fn old_heartbeat_on_running_job_is_stalled() {
        let now = Utc::now();
        let job = job_with(JobStatus::Running, TimeDelta::minutes(5), now);
        let health = JobHealth::evaluate(&job, now, DEFAULT_STALL_THRESHOLD);

        assert!(health.stalled);
        assert!(!health.can_cancel);
        assert!(health.can_terminate);
        assert!(!health.can_delete);
    }

    #[test]
    fn fresh_heartbeat_is_not_stalled() {
        let now = Utc::now();
        let job = job_with(JobStatus::Running, TimeDelta::seconds(20), now);
        let health = JobHealth::evaluate(&job, now, DEFAULT_STALL_THRESHOLD);

        assert!(!health.stalled);
        assert!(health.can_cancel);
        assert!(!health.can_terminate);
    }

    #[test]
    fn terminal_jobs_never_stall() {
        let now = Utc::now();
        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            let job = job_with(status, TimeDelta::hours(2), now);
            let health = JobHealth::evaluate(&job, now, DEFAULT_STALL_THRESHOLD);
            assert!(!health.stalled);
            assert!(health.can_delete);
            assert!(!health.can_cancel && !health.can_terminate);
        }
    }

    #[test]
    fn threshold_boundary_is_exclusive() {
        let now = Utc::now();
        let job = job_with(JobStatus::Running, DEFAULT_STALL_THRESHOLD, now);
        assert!(!is_stalled(&job, now, DEFAULT_STALL_THRESHOLD));
    }

    #[test]
    fn import_percentage_scales_between_30_and_95() {
        assert_eq!(stage_percentage(JobStage::ListingRemote, 0, 0), 10.0);
        assert_eq!(stage_percentage(JobStage::Comparing, 0, 0), 30.0);
        assert_eq!(stage_percentage(JobStage::Importing, 0, 50), 30.0);
        assert_eq!(stage_percentage(JobStage::Importing, 25, 50), 62.5);
        assert_eq!(stage_percentage(JobStage::Importing, 50, 50), 95.0);

        let mut job = job_with(JobStatus::Completed, TimeDelta::zero(), Utc::now());
        job.missing_count = 50;
        assert_eq!(percentage(&job), 100.0);
    }
}
