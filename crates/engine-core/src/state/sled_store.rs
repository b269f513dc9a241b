use crate::{
    error::StateStoreError,
    state::{JobMutation, JobStore, mutation},
};
use async_trait::async_trait;
use model::job::{JobQuery, ReconciliationJob};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

/// Job store backed by an embedded sled tree. Records are bincode encoded
/// under `job:<id>`.
pub struct SledJobStore {
    db: sled::Db,
}

impl SledJobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Helper to generate consistent keys for job records
    #[inline]
    fn job_key(id: &str) -> String {
        format!("job:{id}")
    }

    fn decode(bytes: &[u8]) -> Result<ReconciliationJob, StateStoreError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[async_trait]
impl JobStore for SledJobStore {
    async fn create(&self, job: &ReconciliationJob) -> Result<(), StateStoreError> {
        let key = Self::job_key(&job.id);
        let bytes = bincode::serialize(job)?;

        self.db
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?
            .map_err(|_| StateStoreError::AlreadyExists(job.id.clone()))?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ReconciliationJob>, StateStoreError> {
        match self.db.get(Self::job_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &JobQuery) -> Result<Vec<ReconciliationJob>, StateStoreError> {
        let mut jobs = Vec::new();
        for item in self.db.scan_prefix("job:") {
            let (_key, value) = item?;
            let job = Self::decode(&value)?;
            if query.matches(&job) {
                jobs.push(job);
            }
        }

        jobs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(jobs)
    }

    async fn delete(&self, id: &str) -> Result<(), StateStoreError> {
        match self.db.remove(Self::job_key(id))? {
            Some(_) => {
                self.db.flush_async().await?;
                Ok(())
            }
            None => Err(StateStoreError::NotFound(id.to_string())),
        }
    }

    async fn mutate(
        &self,
        id: &str,
        change: JobMutation,
    ) -> Result<ReconciliationJob, StateStoreError> {
        let key = Self::job_key(id);
        let is_status_change = matches!(change, JobMutation::Status { .. });

        // Read-modify-write inside a transaction so concurrent writers can
        // never interleave between the invariant check and the insert.
        let result = self.db.transaction::<_, _, StateStoreError>(|tx_db| {
            let Some(bytes) = tx_db.get(&key)? else {
                return Err(ConflictableTransactionError::Abort(
                    StateStoreError::NotFound(id.to_string()),
                ));
            };

            let mut job = Self::decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
            mutation::apply(&mut job, change.clone()).map_err(ConflictableTransactionError::Abort)?;

            let encoded = bincode::serialize(&job)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
            tx_db.insert(key.as_bytes(), encoded)?;
            Ok(job)
        });

        let job = match result {
            Ok(job) => job,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        };

        if is_status_change {
            self.db.flush_async().await?;
        }
        Ok(job)
    }
}
