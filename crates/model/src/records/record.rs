use crate::{core::value::Value, error::ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name -> value map. Ordered so snapshots and hashes are stable.
pub type Fields = BTreeMap<String, Value>;

/// One CRM lead (or local row) keyed by its remote id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Builds a record from a raw JSON object, taking the id from `id_field`.
    /// Numeric ids are accepted and stringified.
    pub fn from_json_object(id_field: &str, payload: serde_json::Value) -> Result<Self, ModelError> {
        let serde_json::Value::Object(map) = payload else {
            return Err(ModelError::NotAnObject);
        };

        let id = match map.get(id_field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(ModelError::MissingId(id_field.to_string())),
        };

        let fields = map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect();

        Ok(Self { id, fields })
    }

    pub fn to_json_object(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
