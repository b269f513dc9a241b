use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Failed to read mapping table '{path}': {source}")]
    ReadMappingTable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse mapping table: {0}")]
    ParseMappingTable(#[from] serde_json::Error),

    #[error("Invalid mapping '{mapping_id}': {reason}")]
    InvalidMapping { mapping_id: String, reason: String },
}
