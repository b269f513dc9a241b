use model::{
    core::value::{Value, ValueKind},
    mapping::field::{TargetType, TransformFunction},
};
use std::fmt;
use thiserror::Error;

/// Field-level conversion failure. The value is left unresolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a finite number")]
    NonFinite(String),

    #[error("'{0}' is not an ISO-8601 date")]
    InvalidDate(String),

    #[error("{function} cannot convert a {kind} value")]
    UnsupportedInput {
        function: TransformFunction,
        kind: ValueKind,
    },
}

/// Informational finding. Never blocks an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformWarning {
    TypeMismatch {
        expected: TargetType,
        actual: ValueKind,
    },
}

impl fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformWarning::TypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
        }
    }
}

/// Result of converting one field value. Always produced, never raised.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformOutcome {
    /// `None` when the conversion failed.
    pub value: Option<Value>,
    pub warnings: Vec<TransformWarning>,
    pub errors: Vec<TransformError>,
}

impl TransformOutcome {
    pub fn resolved(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn failed(error: TransformError) -> Self {
        Self {
            value: None,
            warnings: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    pub fn with_warning(mut self, warning: TransformWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

impl From<Result<Value, TransformError>> for TransformOutcome {
    fn from(result: Result<Value, TransformError>) -> Self {
        match result {
            Ok(value) => TransformOutcome::resolved(value),
            Err(err) => TransformOutcome::failed(err),
        }
    }
}
