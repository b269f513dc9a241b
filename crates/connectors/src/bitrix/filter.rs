use model::job::JobFilters;
use serde_json::{Map, Value as Json, json};

/// Remote field names the job filters are applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFields {
    pub scouter: String,
    pub date: String,
}

impl Default for FilterFields {
    fn default() -> Self {
        Self {
            scouter: "UF_CRM_SCOUTER".to_string(),
            date: "DATE_CREATE".to_string(),
        }
    }
}

impl FilterFields {
    pub fn new(scouter: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            scouter: scouter.into(),
            date: date.into(),
        }
    }

    /// Builds the `filter` object of a `crm.*.list` call. Date bounds are
    /// inclusive over whole days.
    pub fn to_filter(&self, filters: &JobFilters) -> Json {
        let mut out = Map::new();
        if let Some(name) = &filters.scouter_name {
            out.insert(format!("={}", self.scouter), json!(name.trim()));
        }
        if let Some(from) = filters.date_from {
            out.insert(
                format!(">={}", self.date),
                json!(format!("{}T00:00:00", from.format("%Y-%m-%d"))),
            );
        }
        if let Some(to) = filters.date_to {
            out.insert(
                format!("<={}", self.date),
                json!(format!("{}T23:59:59", to.format("%Y-%m-%d"))),
            );
        }
        Json::Object(out)
    }

    /// Full list request body: id-only select, stable id order.
    pub fn list_body(&self, filters: &JobFilters, start: u64) -> Json {
        json!({
            "filter": self.to_filter(filters),
            "select": ["ID"],
            "order": { "ID": "ASC" },
            "start": start,
        })
    }
}
