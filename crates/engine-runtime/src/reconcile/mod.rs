use crate::error::ReconcileError;
use chrono::Utc;
use engine_config::settings::ReconcileSettings;
use engine_core::{
    connectors::{local::LocalStore, remote::RemoteCrm},
    error::StateStoreError,
    state::JobStore,
};
use model::{
    job::{JobFilters, JobStage, JobStatus, ReconciliationJob},
    mapping::registry::MappingRegistry,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod compare;
pub mod import;
pub mod listing;

/// Everything a reconciliation run needs.
#[derive(Clone)]
pub struct ReconcileContext {
    pub remote: Arc<dyn RemoteCrm>,
    pub local: Arc<dyn LocalStore>,
    pub store: Arc<dyn JobStore>,
    pub registry: Arc<MappingRegistry>,
    pub settings: ReconcileSettings,
}

/// Drives one job from `listing_remote` to a terminal status.
///
/// The job must already be running in the `listing_remote` stage. Writes
/// refused because an operator stopped the job end the run with the job as
/// stored; any other error is returned for the caller to record.
pub struct JobRunner {
    ctx: ReconcileContext,
    job_id: String,
    filters: JobFilters,
    cancel: CancellationToken,
}

impl JobRunner {
    pub fn new(
        ctx: ReconcileContext,
        job_id: impl Into<String>,
        filters: JobFilters,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            job_id: job_id.into(),
            filters,
            cancel,
        }
    }

    pub async fn run(self) -> Result<ReconciliationJob, ReconcileError> {
        match self.run_stages().await {
            Err(e) if e.is_operator_stop() => {
                info!(job_id = %self.job_id, reason = %e, "Run ended by operator");
                self.current().await
            }
            result => result,
        }
    }

    async fn run_stages(&self) -> Result<ReconciliationJob, ReconcileError> {
        let store = &self.ctx.store;
        let id = self.job_id.as_str();

        let Some(remote_ids) =
            listing::list_remote_ids(&self.ctx, id, &self.filters, &self.cancel).await?
        else {
            return self.current().await;
        };
        info!(job_id = id, remote = remote_ids.len(), "Remote listing finished");

        store.advance_stage(id, JobStage::Comparing, Utc::now()).await?;
        let local_ids = compare::list_local_ids(&self.ctx, &self.filters).await?;
        let missing = compare::missing_ids(&remote_ids, &local_ids);
        let job = store.set_missing(id, missing.len() as u64, Utc::now()).await?;
        info!(
            job_id = id,
            local = local_ids.len(),
            missing = job.missing_count,
            "Comparison finished"
        );

        if missing.is_empty() {
            return Ok(store.set_status(id, JobStatus::Completed, None, Utc::now()).await?);
        }
        if self.cancel.is_cancelled() {
            return self.current().await;
        }

        store.advance_stage(id, JobStage::Importing, Utc::now()).await?;
        let job = import::import_missing(&self.ctx, id, missing, &self.cancel).await?;
        self.finish(job).await
    }

    async fn finish(&self, job: ReconciliationJob) -> Result<ReconciliationJob, ReconcileError> {
        if job.status != JobStatus::Running {
            return Ok(job);
        }
        if job.is_import_finished() {
            let job = self
                .ctx
                .store
                .set_status(&self.job_id, JobStatus::Completed, None, Utc::now())
                .await?;
            info!(
                job_id = %job.id,
                synced = job.synced_count,
                errors = job.error_count,
                "Job completed"
            );
            return Ok(job);
        }
        // Cancelled locally without an operator status change. Leave the
        // final status to whoever tripped the token.
        self.current().await
    }

    async fn current(&self) -> Result<ReconciliationJob, ReconcileError> {
        self.ctx
            .store
            .get(&self.job_id)
            .await?
            .ok_or_else(|| StateStoreError::NotFound(self.job_id.clone()).into())
    }
}
