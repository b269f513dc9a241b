use crate::{
    error::StateStoreError,
    state::{JobMutation, JobStore, mutation},
};
use async_trait::async_trait;
use model::job::{JobQuery, ReconciliationJob};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local job store. Used by tests and by dry runs that should leave
/// nothing behind.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, ReconciliationJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &ReconciliationJob) -> Result<(), StateStoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(StateStoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ReconciliationJob>, StateStoreError> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn list(&self, query: &JobQuery) -> Result<Vec<ReconciliationJob>, StateStoreError> {
        let mut jobs: Vec<_> = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(jobs)
    }

    async fn delete(&self, id: &str) -> Result<(), StateStoreError> {
        self.jobs
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StateStoreError::NotFound(id.to_string()))
    }

    async fn mutate(
        &self,
        id: &str,
        change: JobMutation,
    ) -> Result<ReconciliationJob, StateStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StateStoreError::NotFound(id.to_string()))?;

        // Apply on a copy so a rejected mutation leaves the record intact.
        let mut updated = job.clone();
        mutation::apply(&mut updated, change)?;
        *job = updated.clone();
        Ok(updated)
    }
}
