use engine_core::{
    error::{ConnectorError, StateStoreError},
    retry::RetryError,
};
use model::{error::ModelError, job::JobStatus};
use thiserror::Error;

/// Failure of a reconciliation run. Any of these marks the job as failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Listing remote ids failed: {0}")]
    RemoteListing(#[source] RetryError<ConnectorError>),

    #[error("Listing local ids failed: {0}")]
    LocalListing(#[source] RetryError<ConnectorError>),

    #[error("Remote pagination returned page token '{0}' twice")]
    PaginationLoop(String),

    #[error("Job store error: {0}")]
    Store(#[from] StateStoreError),

    #[error("Progress recorder error: {0}")]
    Recorder(#[from] ActorError),
}

impl ReconcileError {
    /// The store refused a write because an operator already stopped the
    /// job. The run should wind down quietly.
    pub fn is_operator_stop(&self) -> bool {
        match self {
            ReconcileError::Store(StateStoreError::NotRunning { status, .. })
            | ReconcileError::Store(StateStoreError::IllegalStage { status, .. }) => {
                status.is_terminal()
            }
            ReconcileError::Store(StateStoreError::IllegalTransition { from, .. }) => {
                from.is_terminal()
            }
            _ => false,
        }
    }
}

/// Common error type for all actors in the engine.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Actor dropped the reply channel")]
    ReplyDropped,

    #[error("Actor internal error: {0}")]
    Internal(String),
}

/// Rejected operator request.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Cannot {action} job '{job_id}' while {status}: {reason}")]
    IllegalAction {
        action: &'static str,
        job_id: String,
        status: JobStatus,
        reason: &'static str,
    },

    #[error("Job '{0}' is still running over overlapping filters")]
    OverlappingJob(String),

    #[error(transparent)]
    InvalidFilters(#[from] ModelError),

    #[error("Job store error: {0}")]
    Store(#[from] StateStoreError),

    #[error("Job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
