use crate::error::StateStoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::job::{ErrorDetail, JobQuery, JobStage, JobStatus, ReconciliationJob};

pub mod memory;
pub mod mutation;
pub mod sled_store;

pub use mutation::JobMutation;

/// Persistence for reconciliation jobs.
///
/// Implementations apply every [`JobMutation`] atomically with respect to
/// other mutations of the same job, and return the record as it stands after
/// the change. The legality rules live in [`mutation::apply`] so all stores
/// behave the same.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &ReconciliationJob) -> Result<(), StateStoreError>;

    async fn get(&self, id: &str) -> Result<Option<ReconciliationJob>, StateStoreError>;

    /// Jobs matching the query, newest first.
    async fn list(&self, query: &JobQuery) -> Result<Vec<ReconciliationJob>, StateStoreError>;

    async fn delete(&self, id: &str) -> Result<(), StateStoreError>;

    async fn mutate(
        &self,
        id: &str,
        mutation: JobMutation,
    ) -> Result<ReconciliationJob, StateStoreError>;

    async fn set_status(
        &self,
        id: &str,
        status: JobStatus,
        failure: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(
            id,
            JobMutation::Status {
                status,
                failure,
                at,
            },
        )
        .await
    }

    async fn advance_stage(
        &self,
        id: &str,
        stage: JobStage,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::Stage { stage, at }).await
    }

    async fn record_scanned(
        &self,
        id: &str,
        scanned: u64,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::Scanned { scanned, at }).await
    }

    async fn set_remote_total(
        &self,
        id: &str,
        total: u64,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::RemoteTotal { total }).await
    }

    async fn set_missing(
        &self,
        id: &str,
        missing: u64,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::Missing { missing, at }).await
    }

    async fn increment_synced(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::Synced { count: 1, at }).await
    }

    async fn increment_error(
        &self,
        id: &str,
        detail: ErrorDetail,
        max_details: usize,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(
            id,
            JobMutation::Error {
                detail,
                max_details,
            },
        )
        .await
    }

    async fn touch_heartbeat(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<ReconciliationJob, StateStoreError> {
        self.mutate(id, JobMutation::Heartbeat { at }).await
    }
}
