use crate::{
    bitrix::{fields::BitrixFieldCache, filter::FilterFields},
    error::AdapterError,
};
use async_trait::async_trait;
use engine_core::{
    connectors::remote::{IdPage, RemoteCrm},
    error::ConnectorError,
};
use model::{job::JobFilters, records::record::Record};
use reqwest::Client;
use serde_json::{Value as Json, json};
use std::time::Duration;
use tracing::{debug, info};

/// Bitrix answers with this error code when the request rate is exceeded.
const QUERY_LIMIT_EXCEEDED: &str = "QUERY_LIMIT_EXCEEDED";
const ID_FIELD: &str = "ID";

/// Read-only REST client for one CRM entity, authenticated by an inbound
/// webhook URL.
#[derive(Clone)]
pub struct BitrixClient {
    http: Client,
    base_url: String,
    entity: String,
    filter_fields: FilterFields,
}

impl BitrixClient {
    pub fn new(
        webhook_url: &str,
        entity: &str,
        filter_fields: FilterFields,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let base_url = webhook_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(AdapterError::InvalidWebhook {
                url: webhook_url.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        if entity.trim().is_empty() {
            return Err(AdapterError::InvalidWebhook {
                url: webhook_url.to_string(),
                reason: "entity name is empty".to_string(),
            });
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            entity: entity.trim().to_ascii_lowercase(),
            filter_fields,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}.json", self.base_url)
    }

    fn entity_method(&self, action: &str) -> String {
        format!("crm.{}.{action}", self.entity)
    }

    /// Calls a REST method and returns the whole response body.
    async fn call(&self, method: &str, body: &Json) -> Result<Json, ConnectorError> {
        debug!(method, "Calling Bitrix");
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let parsed: Option<Json> = serde_json::from_str(&text).ok();

        if let Some(err) = parsed.as_ref().and_then(api_error) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(ConnectorError::Http {
                status: status.as_u16(),
                message: truncate(&text),
            });
        }
        parsed.ok_or_else(|| ConnectorError::Decode(format!("{method}: body is not JSON")))
    }

    /// Loads field titles and list items, including `crm_status` values.
    pub async fn load_field_cache(&self) -> Result<BitrixFieldCache, ConnectorError> {
        let response = self.call(&self.entity_method("fields"), &json!({})).await?;
        let mut cache = BitrixFieldCache::from_fields_result(&response["result"]);

        for (field_id, status_type) in cache.status_fields() {
            let body = json!({ "filter": { "ENTITY_ID": status_type } });
            let statuses = self.call("crm.status.list", &body).await?;
            cache.add_status_items(&field_id, &statuses["result"]);
        }

        info!(entity = %self.entity, fields = cache.len(), "Loaded Bitrix field metadata");
        Ok(cache)
    }
}

#[async_trait]
impl RemoteCrm for BitrixClient {
    async fn list_ids(
        &self,
        filters: &JobFilters,
        page_token: Option<&str>,
    ) -> Result<IdPage, ConnectorError> {
        let start = match page_token {
            Some(token) => token
                .parse::<u64>()
                .map_err(|_| ConnectorError::Decode(format!("invalid page token '{token}'")))?,
            None => 0,
        };

        let body = self.filter_fields.list_body(filters, start);
        let response = self.call(&self.entity_method("list"), &body).await?;
        parse_id_page(&response)
    }

    async fn get_record(&self, id: &str) -> Result<Record, ConnectorError> {
        let response = self
            .call(&self.entity_method("get"), &json!({ "id": id }))
            .await
            .map_err(|e| match e {
                ConnectorError::Api(msg) if msg.to_ascii_lowercase().contains("not found") => {
                    ConnectorError::NotFound(id.to_string())
                }
                other => other,
            })?;

        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| ConnectorError::Decode("missing 'result'".to_string()))?;
        Record::from_json_object(ID_FIELD, result).map_err(|e| ConnectorError::Decode(e.to_string()))
    }
}

/// Reads `result[].ID` and the `next` offset of a list response.
pub fn parse_id_page(response: &Json) -> Result<IdPage, ConnectorError> {
    let rows = response
        .get("result")
        .and_then(Json::as_array)
        .ok_or_else(|| ConnectorError::Decode("list result is not an array".to_string()))?;

    let ids = rows
        .iter()
        .map(|row| match row.get(ID_FIELD) {
            Some(Json::String(s)) => Ok(s.clone()),
            Some(Json::Number(n)) => Ok(n.to_string()),
            _ => Err(ConnectorError::Decode("list row without ID".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let next = response
        .get("next")
        .and_then(Json::as_u64)
        .map(|n| n.to_string());

    Ok(IdPage { ids, next })
}

fn api_error(body: &Json) -> Option<ConnectorError> {
    let code = body.get("error")?.as_str()?;
    let description = body
        .get("error_description")
        .and_then(Json::as_str)
        .unwrap_or(code);

    if code == QUERY_LIMIT_EXCEEDED {
        return Some(ConnectorError::Http {
            status: 429,
            message: description.to_string(),
        });
    }
    Some(ConnectorError::Api(format!("{code}: {description}")))
}

fn transport_error(err: reqwest::Error) -> ConnectorError {
    ConnectorError::Transport(err.to_string())
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_next_offset() {
        let page = parse_id_page(&json!({
            "result": [ { "ID": "10" }, { "ID": 11 } ],
            "next": 50,
            "total": 120
        }))
        .unwrap();
        assert_eq!(page.ids, vec!["10", "11"]);
        assert_eq!(page.next.as_deref(), Some("50"));

        let last = parse_id_page(&json!({ "result": [], "total": 120 })).unwrap();
        assert!(last.next.is_none());
    }

    #[test]
    fn maps_rate_limit_to_retryable_error() {
        let err = api_error(&json!({
            "error": "QUERY_LIMIT_EXCEEDED",
            "error_description": "Too many requests"
        }))
        .unwrap();
        assert!(err.is_transient());

        let err = api_error(&json!({ "error": "ACCESS_DENIED" })).unwrap();
        assert!(!err.is_transient());
        assert!(api_error(&json!({ "result": [] })).is_none());
    }

    #[test]
    fn rejects_non_http_webhooks() {
        let result = BitrixClient::new(
            "ftp://portal/rest/1/key",
            "lead",
            FilterFields::default(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(AdapterError::InvalidWebhook { .. })));
    }

    #[test]
    fn builds_method_urls_from_webhook() {
        let client = BitrixClient::new(
            "https://acme.bitrix24.ru/rest/1/abc/",
            "Lead",
            FilterFields::default(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.method_url(&client.entity_method("list")),
            "https://acme.bitrix24.ru/rest/1/abc/crm.lead.list.json"
        );
    }

    #[test]
    fn long_bodies_are_truncated() {
        let text = "x".repeat(500);
        assert_eq!(truncate(&text).len(), 203);
        assert_eq!(truncate("short"), "short");
    }
}
