use thiserror::Error;

/// Failure while setting up a connector. Call-time failures use
/// `engine_core::error::ConnectorError`.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidWebhook { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to open local store: {0}")]
    Open(#[from] sled::Error),
}
