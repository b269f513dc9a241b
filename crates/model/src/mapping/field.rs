use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Which way a value travels through a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    RemoteToLocal,
    LocalToRemote,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::RemoteToLocal => "remote-to-local",
            Direction::LocalToRemote => "local-to-remote",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote-to-local" | "pull" | "inbound" => Ok(Direction::RemoteToLocal),
            "local-to-remote" | "push" | "outbound" => Ok(Direction::LocalToRemote),
            _ => Err(ModelError::UnknownVariant {
                kind: "direction",
                value: s.to_string(),
            }),
        }
    }
}

/// Named conversion applied to a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformFunction {
    #[default]
    Identity,
    ToNumber,
    ToString,
    ToBoolean,
    ToDate,
    ToTimestamp,
}

impl TransformFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformFunction::Identity => "identity",
            TransformFunction::ToNumber => "toNumber",
            TransformFunction::ToString => "toString",
            TransformFunction::ToBoolean => "toBoolean",
            TransformFunction::ToDate => "toDate",
            TransformFunction::ToTimestamp => "toTimestamp",
        }
    }
}

impl fmt::Display for TransformFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformFunction {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(TransformFunction::Identity),
            "toNumber" => Ok(TransformFunction::ToNumber),
            "toString" => Ok(TransformFunction::ToString),
            "toBoolean" => Ok(TransformFunction::ToBoolean),
            "toDate" => Ok(TransformFunction::ToDate),
            "toTimestamp" => Ok(TransformFunction::ToTimestamp),
            _ => Err(ModelError::UnknownVariant {
                kind: "transform function",
                value: s.to_string(),
            }),
        }
    }
}

/// Column type of the local schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Integer,
    Text,
    Boolean,
    Date,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Integer => "integer",
            TargetType::Text => "text",
            TargetType::Boolean => "boolean",
            TargetType::Date => "date",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule describing how one remote field corresponds to one local field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub id: String,
    /// Field name on the remote CRM side.
    pub source_field: String,
    /// Field name on the local store side.
    pub target_field: String,
    #[serde(default)]
    pub transform_function: TransformFunction,
    pub target_type: TargetType,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

impl FieldMapping {
    pub fn new(
        id: impl Into<String>,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        transform_function: TransformFunction,
        target_type: TargetType,
    ) -> Self {
        Self {
            id: id.into(),
            source_field: source_field.into(),
            target_field: target_field.into(),
            transform_function,
            target_type,
            active: true,
            hidden: false,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Only active, visible mappings take part in a transform pass.
    pub fn participates(&self) -> bool {
        self.active && !self.hidden
    }

    /// Field read from the input record for the given direction.
    pub fn input_field(&self, direction: Direction) -> &str {
        match direction {
            Direction::RemoteToLocal => &self.source_field,
            Direction::LocalToRemote => &self.target_field,
        }
    }

    /// Field written on the output record for the given direction.
    pub fn output_field(&self, direction: Direction) -> &str {
        match direction {
            Direction::RemoteToLocal => &self.target_field,
            Direction::LocalToRemote => &self.source_field,
        }
    }
}
