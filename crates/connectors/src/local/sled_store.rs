use crate::error::AdapterError;
use async_trait::async_trait;
use engine_core::{connectors::local::LocalStore, error::ConnectorError};
use model::{
    core::value::Value,
    job::JobFilters,
    records::record::Fields,
};
use serde_json::{Map, Value as Json};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use tracing::debug;

/// Local record store on an embedded sled tree. Each record is a JSON
/// object under `rec:<id>`.
pub struct SledRecordStore {
    db: sled::Db,
    scouter_field: String,
    date_field: String,
}

impl SledRecordStore {
    pub fn open(
        path: impl AsRef<Path>,
        scouter_field: impl Into<String>,
        date_field: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            scouter_field: scouter_field.into(),
            date_field: date_field.into(),
        })
    }

    #[inline]
    fn record_key(id: &str) -> String {
        format!("rec:{id}")
    }

    fn decode(bytes: &[u8]) -> Result<Map<String, Json>, ConnectorError> {
        match serde_json::from_slice(bytes) {
            Ok(Json::Object(map)) => Ok(map),
            Ok(_) => Err(ConnectorError::Decode("stored record is not an object".into())),
            Err(e) => Err(ConnectorError::Decode(e.to_string())),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Fields>, ConnectorError> {
        let Some(bytes) = self.db.get(Self::record_key(id)).map_err(storage)? else {
            return Ok(None);
        };
        let map = Self::decode(&bytes)?;
        Ok(Some(
            map.into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.db.scan_prefix("rec:").count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn flush(&self) -> Result<(), ConnectorError> {
        self.db.flush_async().await.map_err(storage)?;
        Ok(())
    }

    fn matches(&self, record: &Map<String, Json>, filters: &JobFilters) -> bool {
        let scouter = record.get(&self.scouter_field).and_then(Json::as_str);
        if !filters.matches_scouter(scouter) {
            return false;
        }
        if filters.date_from.is_none() && filters.date_to.is_none() {
            return true;
        }
        record
            .get(&self.date_field)
            .and_then(|raw| Value::from_json(raw.clone()).as_date())
            .is_some_and(|date| filters.contains_date(date))
    }
}

#[async_trait]
impl LocalStore for SledRecordStore {
    async fn list_ids(&self, filters: &JobFilters) -> Result<Vec<String>, ConnectorError> {
        let mut ids = Vec::new();
        for item in self.db.scan_prefix("rec:") {
            let (key, value) = item.map_err(storage)?;
            let record = Self::decode(&value)?;
            if self.matches(&record, filters) {
                let key = String::from_utf8_lossy(&key);
                if let Some(id) = key.strip_prefix("rec:") {
                    ids.push(id.to_string());
                }
            }
        }
        debug!(count = ids.len(), "Listed local ids");
        Ok(ids)
    }

    /// Merges the given fields into the stored record, creating it if absent.
    async fn upsert(&self, id: &str, fields: Fields) -> Result<(), ConnectorError> {
        let key = Self::record_key(id);

        let result = self.db.transaction::<_, _, ConnectorError>(|tx_db| {
            let mut record = match tx_db.get(&key)? {
                Some(bytes) => Self::decode(&bytes).map_err(ConflictableTransactionError::Abort)?,
                None => Map::new(),
            };
            for (name, value) in &fields {
                record.insert(name.clone(), value.to_json());
            }

            let encoded = serde_json::to_vec(&Json::Object(record)).map_err(|e| {
                ConflictableTransactionError::Abort(ConnectorError::Storage(e.to_string()))
            })?;
            tx_db.insert(key.as_bytes(), encoded)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(storage(e)),
        }
    }
}

fn storage(err: sled::Error) -> ConnectorError {
    ConnectorError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn open(dir: &Path) -> SledRecordStore {
        SledRecordStore::open(dir, "scouter_name", "created_at").unwrap()
    }

    #[tokio::test]
    async fn upsert_merges_into_existing_record() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());

        store.upsert("1", fields(&[("title", "Lead"), ("age", "30")])).await.unwrap();
        store.upsert("1", fields(&[("age", "31")])).await.unwrap();

        let record = store.get("1").await.unwrap().unwrap();
        assert_eq!(record.get("title"), Some(&Value::from("Lead")));
        assert_eq!(record.get("age"), Some(&Value::from("31")));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn lists_ids_matching_filters() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());

        store
            .upsert("1", fields(&[("scouter_name", "Anna"), ("created_at", "2024-01-10T09:00:00+00:00")]))
            .await
            .unwrap();
        store
            .upsert("2", fields(&[("scouter_name", "anna"), ("created_at", "2024-02-10")]))
            .await
            .unwrap();
        store
            .upsert("3", fields(&[("scouter_name", "Boris"), ("created_at", "2024-01-11")]))
            .await
            .unwrap();
        store.upsert("4", fields(&[("scouter_name", "anna")])).await.unwrap();

        let mut all_anna = store.list_ids(&JobFilters::for_scouter("ANNA")).await.unwrap();
        all_anna.sort();
        assert_eq!(all_anna, vec!["1", "2", "4"]);

        let january = JobFilters::for_scouter("anna").between(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        );
        assert_eq!(store.list_ids(&january).await.unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn unknown_ids_are_absent() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        store.upsert("9", fields(&[("title", "Kept")])).await.unwrap();
        store.flush().await.unwrap();

        assert!(store.get("9").await.unwrap().is_some());
        assert!(store.get("10").await.unwrap().is_none());
        assert!(!store.is_empty());
    }
}
