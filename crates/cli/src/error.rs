use connectors::error::AdapterError;
use engine_config::error::SettingsError;
use engine_core::error::ConnectorError;
use engine_runtime::error::ControlError;
use model::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid env file: {0}")]
    EnvFile(String),

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to open {what} at {path}: {reason}")]
    OpenStore {
        what: &'static str,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("Connector setup failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Remote call failed: {0}")]
    Remote(#[from] ConnectorError),

    #[error("Invalid input: {0}")]
    Model(#[from] ModelError),

    #[error("Samples file must hold a JSON array of objects")]
    SamplesNotArray,

    #[error("Failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
