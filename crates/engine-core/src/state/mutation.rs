use crate::error::StateStoreError;
use chrono::{DateTime, Utc};
use model::job::{ErrorDetail, JobStage, JobStatus, ReconciliationJob};

/// A single change to a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMutation {
    Status {
        status: JobStatus,
        failure: Option<String>,
        at: DateTime<Utc>,
    },
    Stage {
        stage: JobStage,
        at: DateTime<Utc>,
    },
    Scanned {
        scanned: u64,
        at: DateTime<Utc>,
    },
    RemoteTotal {
        total: u64,
    },
    Missing {
        missing: u64,
        at: DateTime<Utc>,
    },
    Synced {
        count: u64,
        at: DateTime<Utc>,
    },
    Error {
        detail: ErrorDetail,
        /// Details beyond this many are counted but not kept.
        max_details: usize,
    },
    Heartbeat {
        at: DateTime<Utc>,
    },
}

/// Applies a mutation in place, enforcing the job invariants.
///
/// On error the job is left untouched.
pub fn apply(job: &mut ReconciliationJob, mutation: JobMutation) -> Result<(), StateStoreError> {
    match mutation {
        JobMutation::Status {
            status,
            failure,
            at,
        } => {
            if !job.status.can_transition_to(status) {
                return Err(illegal_transition(job, status));
            }
            if status == JobStatus::Completed
                && (job.stage.rank() < JobStage::Comparing.rank() || !job.is_import_finished())
            {
                return Err(illegal_transition(job, status));
            }

            job.status = status;
            if failure.is_some() {
                job.failure = failure;
            }
            if status == JobStatus::Running {
                job.last_heartbeat_at = at;
            }
            if status.is_terminal() {
                job.completed_at = Some(at);
            }
        }
        JobMutation::Stage { stage, at } => {
            if job.status != JobStatus::Running || stage.rank() <= job.stage.rank() {
                return Err(StateStoreError::IllegalStage {
                    job_id: job.id.clone(),
                    status: job.status,
                    from: job.stage,
                    to: stage,
                });
            }
            job.stage = stage;
            job.last_heartbeat_at = at;
        }
        JobMutation::Scanned { scanned, at } => {
            ensure_running(job)?;
            job.scanned_count = job.scanned_count.max(scanned);
            job.last_heartbeat_at = at;
        }
        JobMutation::RemoteTotal { total } => {
            ensure_running(job)?;
            job.bitrix_total = total;
        }
        JobMutation::Missing { missing, at } => {
            ensure_running(job)?;
            if job.stage != JobStage::Comparing {
                return Err(StateStoreError::IllegalStage {
                    job_id: job.id.clone(),
                    status: job.status,
                    from: job.stage,
                    to: JobStage::Comparing,
                });
            }
            job.missing_count = missing;
            job.last_heartbeat_at = at;
        }
        JobMutation::Synced { count, at } => {
            ensure_capacity(job, count)?;
            ensure_accepting_outcomes(job)?;
            job.synced_count += count;
            bump_heartbeat(job, at);
        }
        JobMutation::Error {
            detail,
            max_details,
        } => {
            ensure_capacity(job, 1)?;
            ensure_accepting_outcomes(job)?;
            job.error_count += 1;
            bump_heartbeat(job, detail.timestamp);
            if job.error_details.len() < max_details {
                job.error_details.push(detail);
            }
        }
        JobMutation::Heartbeat { at } => bump_heartbeat(job, at),
    }

    Ok(())
}

fn illegal_transition(job: &ReconciliationJob, to: JobStatus) -> StateStoreError {
    StateStoreError::IllegalTransition {
        job_id: job.id.clone(),
        from: job.status,
        to,
    }
}

fn ensure_running(job: &ReconciliationJob) -> Result<(), StateStoreError> {
    if job.status == JobStatus::Running {
        Ok(())
    } else {
        Err(StateStoreError::NotRunning {
            job_id: job.id.clone(),
            status: job.status,
        })
    }
}

/// Import outcomes land while running and during the drain of an operator
/// cancel. A terminal status carrying a failure (failed, or terminated as
/// cancelled) takes no further counts.
fn ensure_accepting_outcomes(job: &ReconciliationJob) -> Result<(), StateStoreError> {
    let draining = job.status == JobStatus::Cancelled && job.failure.is_none();
    if job.status == JobStatus::Running || draining {
        Ok(())
    } else {
        Err(StateStoreError::NotRunning {
            job_id: job.id.clone(),
            status: job.status,
        })
    }
}

/// Counters never move past `missing_count`.
fn ensure_capacity(job: &ReconciliationJob, count: u64) -> Result<(), StateStoreError> {
    let attempted = job.attempted() + count;
    if attempted > job.missing_count {
        return Err(StateStoreError::CounterOverflow {
            job_id: job.id.clone(),
            attempted,
            missing: job.missing_count,
        });
    }
    Ok(())
}

fn bump_heartbeat(job: &mut ReconciliationJob, at: DateTime<Utc>) {
    if job.status == JobStatus::Running && at > job.last_heartbeat_at {
        job.last_heartbeat_at = at;
    }
}
