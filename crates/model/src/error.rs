use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Record payload is not a JSON object")]
    NotAnObject,

    #[error("Record is missing its id field '{0}'")]
    MissingId(String),

    #[error("Invalid job filters: {0}")]
    InvalidFilters(String),

    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
