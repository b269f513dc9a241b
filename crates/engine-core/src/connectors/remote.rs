use crate::error::ConnectorError;
use async_trait::async_trait;
use model::{job::JobFilters, records::record::Record};

/// One page of remote ids. `next` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<String>,
    pub next: Option<String>,
}

/// Read side of the remote CRM. Paginated; totals are never assumed upfront.
#[async_trait]
pub trait RemoteCrm: Send + Sync {
    async fn list_ids(
        &self,
        filters: &JobFilters,
        page_token: Option<&str>,
    ) -> Result<IdPage, ConnectorError>;

    async fn get_record(&self, id: &str) -> Result<Record, ConnectorError>;
}
