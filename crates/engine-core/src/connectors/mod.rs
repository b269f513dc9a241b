use crate::{
    error::ConnectorError,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use std::{future::Future, time::Duration};

pub mod local;
pub mod metadata;
pub mod remote;

pub fn classify_connector_error(err: &ConnectorError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

/// Bounds a single connector call with a timeout.
pub async fn timed<T, Fut>(limit: Duration, call: Fut) -> Result<T, ConnectorError>
where
    Fut: Future<Output = Result<T, ConnectorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout(limit)),
    }
}

/// Runs a connector call under a per-attempt timeout and the retry policy.
pub async fn call_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    limit: Duration,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<ConnectorError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectorError>>,
{
    policy
        .run(label, || timed(limit, op()), classify_connector_error)
        .await
}
