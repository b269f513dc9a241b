use crate::{
    error::{ControlError, ReconcileError},
    reconcile::{JobRunner, ReconcileContext},
};
use chrono::Utc;
use engine_core::{progress::JobHealth, state::JobStore};
use model::job::{JobFilters, JobId, JobQuery, JobStage, JobStatus, ReconciliationJob};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::Mutex,
    task::{AbortHandle, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

struct RunningJob {
    cancel: CancellationToken,
    abort: AbortHandle,
}

type RunningJobs = Arc<Mutex<HashMap<JobId, RunningJob>>>;

/// A started job. Dropping the handle detaches from the run without
/// stopping it.
pub struct JobHandle {
    job: ReconciliationJob,
    supervisor: JoinHandle<()>,
}

impl JobHandle {
    /// The job as it stood when the run was spawned.
    pub fn job(&self) -> &ReconciliationJob {
        &self.job
    }

    pub fn id(&self) -> &str {
        &self.job.id
    }

    /// Waits until the run has ended and its final status is stored.
    pub async fn wait(self) -> Result<(), ControlError> {
        self.supervisor.await?;
        Ok(())
    }
}

/// Operator-facing entry point: start, cancel, terminate, delete and
/// inspect reconciliation jobs.
#[derive(Clone)]
pub struct JobController {
    ctx: ReconcileContext,
    running: RunningJobs,
    start_lock: Arc<Mutex<()>>,
}

impl JobController {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self {
            ctx,
            running: Arc::new(Mutex::new(HashMap::new())),
            start_lock: Arc::new(Mutex::new(())),
        }
    }

    fn store(&self) -> &Arc<dyn JobStore> {
        &self.ctx.store
    }

    /// Creates a job and runs it in the background.
    ///
    /// Rejected while another non-terminal job covers overlapping filters.
    pub async fn start(&self, filters: JobFilters) -> Result<JobHandle, ControlError> {
        filters.validate()?;
        let _guard = self.start_lock.lock().await;

        let jobs = self.store().list(&JobQuery::default()).await?;
        if let Some(existing) = jobs
            .iter()
            .find(|job| !job.status.is_terminal() && job.filters.overlaps(&filters))
        {
            return Err(ControlError::OverlappingJob(existing.id.clone()));
        }

        let now = Utc::now();
        let job = ReconciliationJob::new(filters.clone(), now);
        let id = job.id.clone();
        self.store().create(&job).await?;
        self.store()
            .set_status(&id, JobStatus::Running, None, now)
            .await?;
        let job = self
            .store()
            .advance_stage(&id, JobStage::ListingRemote, now)
            .await?;

        let cancel = CancellationToken::new();
        let runner = JobRunner::new(self.ctx.clone(), &id, filters, cancel.clone());
        let span = info_span!("job", job_id = %id);
        let inner = tokio::spawn(runner.run().instrument(span));

        self.running.lock().await.insert(
            id.clone(),
            RunningJob {
                cancel,
                abort: inner.abort_handle(),
            },
        );
        let supervisor = tokio::spawn(supervise(
            self.store().clone(),
            self.running.clone(),
            id.clone(),
            inner,
        ));

        info!(job_id = %id, filters = ?job.filters, "Job started");
        Ok(JobHandle { job, supervisor })
    }

    pub async fn job(&self, job_id: &str) -> Result<ReconciliationJob, ControlError> {
        self.store()
            .get(job_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(job_id.to_string()))
    }

    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<ReconciliationJob>, ControlError> {
        Ok(self.store().list(query).await?)
    }

    pub async fn health(&self, job_id: &str) -> Result<JobHealth, ControlError> {
        let job = self.job(job_id).await?;
        Ok(self.evaluate(&job))
    }

    fn evaluate(&self, job: &ReconciliationJob) -> JobHealth {
        JobHealth::evaluate(job, Utc::now(), self.ctx.settings.stall_threshold)
    }

    /// Stops a healthy running job. Records already in flight finish and are
    /// counted.
    pub async fn cancel(&self, job_id: &str) -> Result<ReconciliationJob, ControlError> {
        let job = self.job(job_id).await?;
        let health = self.evaluate(&job);
        if !health.can_cancel {
            let reason = if health.stalled {
                "job is stalled, terminate it instead"
            } else {
                "job is not running"
            };
            return Err(illegal("cancel", &job, reason));
        }

        let job = self
            .store()
            .set_status(job_id, JobStatus::Cancelled, None, Utc::now())
            .await?;
        if let Some(run) = self.running.lock().await.get(job_id) {
            run.cancel.cancel();
        }
        info!(job_id, synced = job.synced_count, errors = job.error_count, "Job cancelled");
        Ok(job)
    }

    /// Forces a stalled job into its terminal status and abandons its run.
    pub async fn terminate(&self, job_id: &str) -> Result<ReconciliationJob, ControlError> {
        let job = self.job(job_id).await?;
        let health = self.evaluate(&job);
        if !health.can_terminate {
            let reason = if job.status == JobStatus::Running {
                "job is still making progress, cancel it instead"
            } else {
                "job is not running"
            };
            return Err(illegal("terminate", &job, reason));
        }

        let status = self.ctx.settings.terminate_as.status();
        let failure = format!(
            "terminated by operator after {}s without a heartbeat",
            health.heartbeat_age_secs
        );
        let job = self
            .store()
            .set_status(job_id, status, Some(failure), Utc::now())
            .await?;
        if let Some(run) = self.running.lock().await.remove(job_id) {
            run.cancel.cancel();
            run.abort.abort();
        }
        warn!(job_id, status = %job.status, "Stalled job terminated");
        Ok(job)
    }

    /// Removes a finished job and its error details.
    pub async fn delete(&self, job_id: &str) -> Result<(), ControlError> {
        let job = self.job(job_id).await?;
        if !job.status.is_terminal() {
            return Err(illegal("delete", &job, "only finished jobs can be deleted"));
        }
        self.store().delete(job_id).await?;
        info!(job_id, "Job deleted");
        Ok(())
    }
}

fn illegal(action: &'static str, job: &ReconciliationJob, reason: &'static str) -> ControlError {
    ControlError::IllegalAction {
        action,
        job_id: job.id.clone(),
        status: job.status,
        reason,
    }
}

/// Waits for a run and stores a failed status if it ended abnormally.
async fn supervise(
    store: Arc<dyn JobStore>,
    running: RunningJobs,
    job_id: JobId,
    inner: JoinHandle<Result<ReconciliationJob, ReconcileError>>,
) {
    let outcome = inner.await;
    running.lock().await.remove(&job_id);

    let failure = match outcome {
        Ok(Ok(job)) if job.status != JobStatus::Running => {
            info!(
                job_id,
                status = %job.status,
                synced = job.synced_count,
                errors = job.error_count,
                "Job finished"
            );
            return;
        }
        Ok(Ok(job)) => format!(
            "run ended with {} of {} records attempted",
            job.attempted(),
            job.missing_count
        ),
        Ok(Err(e)) => e.to_string(),
        Err(e) if e.is_cancelled() => {
            info!(job_id, "Job run aborted");
            return;
        }
        Err(e) => format!("job run panicked: {e}"),
    };

    error!(job_id, failure, "Job failed");
    if let Err(e) = store
        .set_status(&job_id, JobStatus::Failed, Some(failure), Utc::now())
        .await
    {
        warn!(job_id, error = %e, "Could not store failed status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use engine_config::settings::ReconcileSettings;
    use engine_core::{
        connectors::{
            local::LocalStore,
            remote::{IdPage, RemoteCrm},
        },
        error::ConnectorError,
        state::memory::InMemoryJobStore,
    };
    use model::{
        mapping::registry::MappingRegistry,
        records::record::{Fields, Record},
    };

    struct NoRemote;

    #[async_trait]
    impl RemoteCrm for NoRemote {
        async fn list_ids(
            &self,
            _filters: &JobFilters,
            _page_token: Option<&str>,
        ) -> Result<IdPage, ConnectorError> {
            Ok(IdPage::default())
        }

        async fn get_record(&self, id: &str) -> Result<Record, ConnectorError> {
            Err(ConnectorError::NotFound(id.to_string()))
        }
    }

    struct NoLocal;

    #[async_trait]
    impl LocalStore for NoLocal {
        async fn list_ids(&self, _filters: &JobFilters) -> Result<Vec<String>, ConnectorError> {
            Ok(Vec::new())
        }

        async fn upsert(&self, _id: &str, _fields: Fields) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    fn controller() -> (JobController, Arc<dyn JobStore>) {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let ctx = ReconcileContext {
            remote: Arc::new(NoRemote),
            local: Arc::new(NoLocal),
            store: store.clone(),
            registry: Arc::new(MappingRegistry::new(Vec::new())),
            settings: ReconcileSettings::default(),
        };
        (JobController::new(ctx), store)
    }

    /// Stores a running job whose last heartbeat is `age` old.
    async fn running_job(store: &Arc<dyn JobStore>, age: TimeDelta) -> ReconciliationJob {
        let mut job = ReconciliationJob::new(JobFilters::for_scouter("anna"), Utc::now());
        job.status = JobStatus::Running;
        job.stage = JobStage::ListingRemote;
        job.last_heartbeat_at = Utc::now() - age;
        store.create(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn empty_remote_completes_immediately() {
        let (controller, _) = controller();
        let handle = controller.start(JobFilters::default()).await.unwrap();
        let id = handle.id().to_string();
        handle.wait().await.unwrap();

        let job = controller.job(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.missing_count, 0);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn stalled_jobs_must_be_terminated_not_cancelled() {
        let (controller, store) = controller();
        let job = running_job(&store, TimeDelta::minutes(10)).await;

        let err = controller.cancel(&job.id).await.unwrap_err();
        assert!(matches!(err, ControlError::IllegalAction { action: "cancel", .. }));

        let terminated = controller.terminate(&job.id).await.unwrap();
        assert_eq!(terminated.status, JobStatus::Failed);
        assert!(terminated.failure.unwrap().contains("without a heartbeat"));
    }

    #[tokio::test]
    async fn healthy_jobs_cannot_be_terminated() {
        let (controller, store) = controller();
        let job = running_job(&store, TimeDelta::seconds(5)).await;

        assert!(matches!(
            controller.terminate(&job.id).await,
            Err(ControlError::IllegalAction { action: "terminate", .. })
        ));
        let cancelled = controller.cancel(&job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn only_terminal_jobs_are_deleted() {
        let (controller, store) = controller();
        let job = running_job(&store, TimeDelta::seconds(5)).await;

        assert!(matches!(
            controller.delete(&job.id).await,
            Err(ControlError::IllegalAction { action: "delete", .. })
        ));
        controller.cancel(&job.id).await.unwrap();
        controller.delete(&job.id).await.unwrap();
        assert!(matches!(
            controller.job(&job.id).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn overlapping_start_is_rejected() {
        let (controller, store) = controller();
        let job = running_job(&store, TimeDelta::seconds(5)).await;

        let err = controller.start(JobFilters::for_scouter("ANNA")).await;
        assert!(matches!(err, Err(ControlError::OverlappingJob(id)) if id == job.id));

        assert!(controller.start(JobFilters::for_scouter("boris")).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_filters_are_rejected_before_anything_is_stored() {
        let (controller, store) = controller();
        let filters = JobFilters::default().between(
            chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
        );
        assert!(matches!(
            controller.start(filters).await,
            Err(ControlError::InvalidFilters(_))
        ));
        assert!(store.list(&JobQuery::default()).await.unwrap().is_empty());
    }
}
