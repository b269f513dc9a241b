#![allow(dead_code)]

use async_trait::async_trait;
use engine_core::{
    connectors::{
        local::LocalStore,
        remote::{IdPage, RemoteCrm},
    },
    error::ConnectorError,
};
use model::{
    core::value::Value,
    job::JobFilters,
    records::record::{Fields, Record},
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Semaphore;

pub mod integration;
pub mod utils;

/// Remote-side field carrying the scouter name.
pub const REMOTE_SCOUTER: &str = "UF_CRM_SCOUTER";
/// Local-side field carrying the scouter name.
pub const LOCAL_SCOUTER: &str = "scouter_name";

/// In-memory remote CRM. Ids are served in insertion order, `page_size` at
/// a time, with offset page tokens like the Bitrix `start`/`next` pair.
pub struct FakeRemote {
    records: Vec<Record>,
    page_size: usize,
    /// Listed but answered with `NotFound` on fetch.
    gone: HashSet<String>,
    /// Remaining transport failures per id before a fetch succeeds.
    flaky: Mutex<HashMap<String, usize>>,
    /// When set, every fetch consumes one permit.
    gate: Option<Arc<Semaphore>>,
    failing_listing: bool,
    token_cycle: Vec<String>,
    fetches: AtomicUsize,
}

impl FakeRemote {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            page_size: 50,
            gone: HashSet::new(),
            flaky: Mutex::new(HashMap::new()),
            gate: None,
            failing_listing: false,
            token_cycle: Vec::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_gone(mut self, ids: &[&str]) -> Self {
        self.gone.extend(ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_flaky(self, id: &str, failures: usize) -> Self {
        self.flaky
            .lock()
            .expect("flaky lock")
            .insert(id.to_string(), failures);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }

    pub fn with_repeating_token(self) -> Self {
        self.with_token_cycle(&["same"])
    }

    /// Every page points at the next token of `tokens`, wrapping around, so
    /// the listing never ends on its own.
    pub fn with_token_cycle(mut self, tokens: &[&str]) -> Self {
        self.token_cycle = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn matching(&self, filters: &JobFilters) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| filters.matches_scouter(r.get(REMOTE_SCOUTER).and_then(Value::as_str)))
            .collect()
    }
}

#[async_trait]
impl RemoteCrm for FakeRemote {
    async fn list_ids(
        &self,
        filters: &JobFilters,
        page_token: Option<&str>,
    ) -> Result<IdPage, ConnectorError> {
        if self.failing_listing {
            return Err(ConnectorError::Http {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        if !self.token_cycle.is_empty() {
            let position = page_token
                .and_then(|t| self.token_cycle.iter().position(|c| c == t))
                .map_or(0, |i| i + 1);
            let next = &self.token_cycle[position % self.token_cycle.len()];
            return Ok(IdPage {
                ids: vec![(position + 1).to_string()],
                next: Some(next.clone()),
            });
        }

        let start = page_token.map_or(Ok(0), str::parse::<usize>).map_err(|e| {
            ConnectorError::Decode(format!("bad token: {e}"))
        })?;
        let matching = self.matching(filters);
        let end = (start + self.page_size).min(matching.len());
        let ids = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|r| r.id.clone())
            .collect();
        let next = (end < matching.len()).then(|| end.to_string());
        Ok(IdPage { ids, next })
    }

    async fn get_record(&self, id: &str) -> Result<Record, ConnectorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ConnectorError::Transport(e.to_string()))?
                .forget();
        }
        {
            let mut flaky = self.flaky.lock().expect("flaky lock");
            if let Some(left) = flaky.get_mut(id)
                && *left > 0
            {
                *left -= 1;
                return Err(ConnectorError::Transport("connection reset".into()));
            }
        }
        if self.gone.contains(id) {
            return Err(ConnectorError::NotFound(id.to_string()));
        }
        self.records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(id.to_string()))
    }
}

/// In-memory local store keyed by record id.
#[derive(Default)]
pub struct FakeLocal {
    records: Mutex<HashMap<String, Fields>>,
}

impl FakeLocal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local rows carrying only the scouter field.
    pub fn with_ids<I, S>(ids: I, scouter: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = ids
            .into_iter()
            .map(|id| {
                let mut fields = Fields::new();
                fields.insert(LOCAL_SCOUTER.to_string(), Value::from(scouter));
                (id.into(), fields)
            })
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn get(&self, id: &str) -> Option<Fields> {
        self.records.lock().expect("local lock").get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("local lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LocalStore for FakeLocal {
    async fn list_ids(&self, filters: &JobFilters) -> Result<Vec<String>, ConnectorError> {
        let records = self.records.lock().expect("local lock");
        Ok(records
            .iter()
            .filter(|(_, f)| filters.matches_scouter(f.get(LOCAL_SCOUTER).and_then(Value::as_str)))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn upsert(&self, id: &str, fields: Fields) -> Result<(), ConnectorError> {
        let mut records = self.records.lock().expect("local lock");
        records.entry(id.to_string()).or_default().extend(fields);
        Ok(())
    }
}
