use model::job::{JobStage, JobStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Job '{0}' already exists")]
    AlreadyExists(String),

    #[error("Job '{job_id}' cannot move from status {from} to {to}")]
    IllegalTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job '{job_id}' cannot move from stage {from} to {to} while {status}")]
    IllegalStage {
        job_id: String,
        status: JobStatus,
        from: JobStage,
        to: JobStage,
    },

    #[error("Job '{job_id}' is {status}, not running")]
    NotRunning { job_id: String, status: JobStatus },

    #[error("Job '{job_id}' counter overflow: {attempted} attempted of {missing} missing")]
    CounterOverflow {
        job_id: String,
        attempted: u64,
        missing: u64,
    },

    #[error("Failed to (de)serialize job record: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for StateStoreError {
    fn from(err: sled::Error) -> Self {
        StateStoreError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for StateStoreError {
    fn from(err: bincode::Error) -> Self {
        StateStoreError::Serialization(err.to_string())
    }
}

/// Failure talking to the remote CRM or the local record store.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Remote API error: {0}")]
    Api(String),

    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Local store error: {0}")]
    Storage(String),
}

impl ConnectorError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Timeout(_) | ConnectorError::Transport(_) => true,
            ConnectorError::Http { status, .. } => *status == 429 || *status >= 500,
            ConnectorError::Api(_)
            | ConnectorError::NotFound(_)
            | ConnectorError::Decode(_)
            | ConnectorError::Storage(_) => false,
        }
    }
}
