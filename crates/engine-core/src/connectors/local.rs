use crate::error::ConnectorError;
use async_trait::async_trait;
use model::{job::JobFilters, records::record::Fields};

/// The local record store being kept in sync.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn list_ids(&self, filters: &JobFilters) -> Result<Vec<String>, ConnectorError>;

    async fn upsert(&self, id: &str, fields: Fields) -> Result<(), ConnectorError>;
}
