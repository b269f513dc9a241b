use crate::{
    actor::{Actor, ActorContext, ActorRef, messages::RecorderMsg, spawn_actor},
    error::{ActorError, ReconcileError},
};
use async_trait::async_trait;
use chrono::Utc;
use engine_core::{
    error::StateStoreError,
    state::{JobMutation, JobStore},
};
use model::job::{ErrorDetail, JobStatus, ReconciliationJob};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const MAILBOX_CAPACITY: usize = 256;
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Sole writer of a job's import counters.
///
/// Successes are buffered and written once `heartbeat_every` of them are
/// pending or `heartbeat_interval` has passed since the last write, each
/// write refreshing the heartbeat. Failures are written as they arrive. When
/// a write shows the job is no longer running, the shared cancellation token
/// is tripped so workers stop picking up records.
pub struct ProgressRecorder {
    job_id: String,
    store: Arc<dyn JobStore>,
    cancel: CancellationToken,
    heartbeat_every: u64,
    heartbeat_interval: Duration,
    max_error_details: usize,
    pending_synced: u64,
    last_write: Instant,
    fatal: Option<StateStoreError>,
}

impl ProgressRecorder {
    pub fn new(
        job_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        cancel: CancellationToken,
        heartbeat_every: usize,
        max_error_details: usize,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            store,
            cancel,
            heartbeat_every: heartbeat_every.max(1) as u64,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_error_details,
            pending_synced: 0,
            last_write: Instant::now(),
            fatal: None,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn spawn(self) -> (RecorderHandle, JoinHandle<()>) {
        let name = format!("recorder-{}", self.job_id);
        let (actor, join) = spawn_actor(name, MAILBOX_CAPACITY, self);
        (RecorderHandle { actor }, join)
    }

    fn write_due(&self) -> bool {
        self.pending_synced >= self.heartbeat_every
            || self.last_write.elapsed() >= self.heartbeat_interval
    }

    /// Pending successes stay buffered until a write is accepted.
    async fn write_synced(&mut self) -> Result<Option<ReconciliationJob>, StateStoreError> {
        if self.pending_synced == 0 {
            return Ok(None);
        }
        let count = self.pending_synced;
        let job = self
            .store
            .mutate(&self.job_id, JobMutation::Synced { count, at: Utc::now() })
            .await?;
        self.pending_synced = 0;
        self.last_write = Instant::now();
        Ok(Some(job))
    }

    async fn flush(&mut self) -> Result<ReconciliationJob, StateStoreError> {
        if let Some(err) = self.fatal.take() {
            return Err(err);
        }
        let job = match self.write_synced().await? {
            Some(job) => job,
            None => self
                .store
                .get(&self.job_id)
                .await?
                .ok_or_else(|| StateStoreError::NotFound(self.job_id.clone()))?,
        };
        self.observe(&job);
        Ok(job)
    }

    fn observe(&self, job: &ReconciliationJob) {
        if job.status != JobStatus::Running && !self.cancel.is_cancelled() {
            info!(job_id = %job.id, status = %job.status, "Job stopped by operator, draining imports");
            self.cancel.cancel();
        }
    }

    /// Handles a rejected write. Returns `None` when the rejection only means
    /// the job has already stopped.
    fn reject(&mut self, err: StateStoreError) -> Option<ActorError> {
        self.cancel.cancel();
        let stopped = is_stopped(&err);
        let message = err.to_string();
        if stopped {
            info!(
                job_id = %self.job_id,
                dropped = self.pending_synced,
                reason = %message,
                "Job no longer takes progress, dropping outcomes"
            );
            self.pending_synced = 0;
        } else {
            error!(job_id = %self.job_id, error = %message, "Progress write failed, stopping imports");
        }
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        (!stopped).then(|| ActorError::Internal(message))
    }
}

fn is_stopped(err: &StateStoreError) -> bool {
    match err {
        StateStoreError::NotRunning { status, .. } => status.is_terminal(),
        _ => false,
    }
}

#[async_trait]
impl Actor<RecorderMsg> for ProgressRecorder {
    async fn handle(&mut self, msg: RecorderMsg, _ctx: &ActorContext) -> Result<(), ActorError> {
        match msg {
            RecorderMsg::Synced { record_id } => {
                trace!(job_id = %self.job_id, record_id, "Record synced");
                self.pending_synced += 1;
                if self.write_due() {
                    match self.write_synced().await {
                        Ok(Some(job)) => self.observe(&job),
                        Ok(None) => {}
                        Err(e) => {
                            if let Some(err) = self.reject(e) {
                                return Err(err);
                            }
                        }
                    }
                }
            }
            RecorderMsg::Failed { detail } => {
                let result = self
                    .store
                    .increment_error(&self.job_id, detail, self.max_error_details)
                    .await;
                match result {
                    Ok(job) => {
                        self.last_write = Instant::now();
                        self.observe(&job);
                    }
                    Err(e) => {
                        if let Some(err) = self.reject(e) {
                            return Err(err);
                        }
                    }
                }
            }
            RecorderMsg::Flush { reply } => {
                let result = self.flush().await;
                if reply.send(result).is_err() {
                    warn!(job_id = %self.job_id, "Flush requester went away");
                }
            }
        }
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        match self.write_synced().await {
            Ok(_) => Ok(()),
            Err(e) if is_stopped(&e) => {
                debug!(
                    job_id = %self.job_id,
                    dropped = self.pending_synced,
                    reason = %e,
                    "Skipped final progress write"
                );
                Ok(())
            }
            Err(e) => Err(ActorError::Internal(e.to_string())),
        }
    }
}

/// Typed front of the recorder mailbox.
#[derive(Clone)]
pub struct RecorderHandle {
    actor: ActorRef<RecorderMsg>,
}

impl RecorderHandle {
    pub async fn synced(&self, record_id: impl Into<String>) -> Result<(), ActorError> {
        self.actor
            .send(RecorderMsg::Synced {
                record_id: record_id.into(),
            })
            .await
    }

    pub async fn failed(&self, detail: ErrorDetail) -> Result<(), ActorError> {
        self.actor.send(RecorderMsg::Failed { detail }).await
    }

    pub async fn flush(&self) -> Result<ReconciliationJob, ReconcileError> {
        let (reply, rx) = oneshot::channel();
        self.actor.send(RecorderMsg::Flush { reply }).await?;
        let job = rx.await.map_err(|_| ActorError::ReplyDropped)??;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::state::memory::InMemoryJobStore;
    use model::job::{JobFilters, JobQuery, JobStage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects the first `failures` success writes, then behaves normally.
    struct FlakyStore {
        inner: InMemoryJobStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn create(&self, job: &ReconciliationJob) -> Result<(), StateStoreError> {
            self.inner.create(job).await
        }

        async fn get(&self, id: &str) -> Result<Option<ReconciliationJob>, StateStoreError> {
            self.inner.get(id).await
        }

        async fn list(&self, query: &JobQuery) -> Result<Vec<ReconciliationJob>, StateStoreError> {
            self.inner.list(query).await
        }

        async fn delete(&self, id: &str) -> Result<(), StateStoreError> {
            self.inner.delete(id).await
        }

        async fn mutate(
            &self,
            id: &str,
            mutation: JobMutation,
        ) -> Result<ReconciliationJob, StateStoreError> {
            if matches!(mutation, JobMutation::Synced { .. })
                && self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(StateStoreError::Storage("disk full".into()));
            }
            self.inner.mutate(id, mutation).await
        }
    }

    async fn importing_job(store: &Arc<dyn JobStore>, missing: u64) -> String {
        let now = Utc::now();
        let job = ReconciliationJob::new(JobFilters::default(), now);
        store.create(&job).await.unwrap();
        store.set_status(&job.id, JobStatus::Running, None, now).await.unwrap();
        for stage in [JobStage::ListingRemote, JobStage::Comparing] {
            store.advance_stage(&job.id, stage, now).await.unwrap();
        }
        store.set_missing(&job.id, missing, now).await.unwrap();
        store.advance_stage(&job.id, JobStage::Importing, now).await.unwrap();
        job.id
    }

    #[tokio::test]
    async fn successes_are_written_in_batches() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 5).await;
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), CancellationToken::new(), 2, 10).spawn();

        for record in ["1", "2", "3"] {
            recorder.synced(record).await.unwrap();
        }
        recorder
            .failed(ErrorDetail::new("4", "not found", Utc::now()))
            .await
            .unwrap();

        // The mailbox is ordered: everything above is applied before this.
        let job = recorder.flush().await.unwrap();
        assert_eq!(job.synced_count, 3);
        assert_eq!(job.error_count, 1);
        assert_eq!(job.error_details[0].record_id, "4");

        drop(recorder);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn pending_successes_are_written_on_stop() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 5).await;
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), CancellationToken::new(), 10, 10).spawn();

        recorder.synced("1").await.unwrap();
        drop(recorder);
        join.await.unwrap();

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.synced_count, 1);
    }

    #[tokio::test]
    async fn external_cancel_trips_the_token() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 5).await;
        let cancel = CancellationToken::new();
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), cancel.clone(), 1, 10).spawn();

        store
            .set_status(&id, JobStatus::Cancelled, None, Utc::now())
            .await
            .unwrap();
        recorder.synced("1").await.unwrap();
        let job = recorder.flush().await.unwrap();

        assert!(cancel.is_cancelled());
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.synced_count, 1);

        drop(recorder);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn overflow_is_reported_on_flush() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 1).await;
        let cancel = CancellationToken::new();
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), cancel.clone(), 1, 10).spawn();

        recorder.synced("1").await.unwrap();
        recorder.synced("2").await.unwrap();

        assert!(matches!(
            recorder.flush().await,
            Err(ReconcileError::Store(StateStoreError::CounterOverflow { .. }))
        ));
        assert!(cancel.is_cancelled());

        drop(recorder);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_keeps_pending_successes() {
        let store: Arc<dyn JobStore> = Arc::new(FlakyStore {
            inner: InMemoryJobStore::new(),
            failures: AtomicUsize::new(1),
        });
        let id = importing_job(&store, 5).await;
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), CancellationToken::new(), 2, 10).spawn();

        for record in ["1", "2", "3"] {
            recorder.synced(record).await.unwrap();
        }

        assert!(matches!(
            recorder.flush().await,
            Err(ReconcileError::Store(StateStoreError::Storage(_)))
        ));
        drop(recorder);
        join.await.unwrap();

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.synced_count, 3);
    }

    #[tokio::test]
    async fn outcomes_after_termination_are_dropped() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 5).await;
        let cancel = CancellationToken::new();
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), cancel.clone(), 10, 10).spawn();

        recorder.synced("1").await.unwrap();
        store
            .set_status(
                &id,
                JobStatus::Failed,
                Some("terminated by operator".into()),
                Utc::now(),
            )
            .await
            .unwrap();
        recorder.synced("2").await.unwrap();
        recorder
            .failed(ErrorDetail::new("3", "late", Utc::now()))
            .await
            .unwrap();

        let err = recorder.flush().await.unwrap_err();
        assert!(err.is_operator_stop());
        assert!(cancel.is_cancelled());

        drop(recorder);
        join.await.unwrap();

        let job = store.get(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempted(), 0);
    }

    #[tokio::test]
    async fn quiet_stretch_forces_a_write() {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let id = importing_job(&store, 5).await;
        let (recorder, join) =
            ProgressRecorder::new(&id, store.clone(), CancellationToken::new(), 100, 10)
                .with_heartbeat_interval(Duration::from_millis(20))
                .spawn();

        let before = store.get(&id).await.unwrap().unwrap().last_heartbeat_at;
        tokio::time::sleep(Duration::from_millis(30)).await;
        recorder.synced("1").await.unwrap();

        let job = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let job = store.get(&id).await.unwrap().unwrap();
                if job.synced_count == 1 {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("success written without a flush");
        assert!(job.last_heartbeat_at > before);

        drop(recorder);
        join.await.unwrap();
    }
}
