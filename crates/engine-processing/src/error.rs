use engine_core::{error::ConnectorError, retry::RetryError};
use thiserror::Error;

/// Why a single record could not be imported. Never fatal to the job.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to fetch remote record: {0}")]
    Fetch(#[source] RetryError<ConnectorError>),

    #[error("No field could be converted ({errors} field errors)")]
    NothingResolved { errors: usize },

    #[error("Failed to write local record: {0}")]
    Upsert(#[source] RetryError<ConnectorError>),
}
