#![allow(dead_code)]

use crate::{FakeLocal, FakeRemote, REMOTE_SCOUTER};
use chrono::TimeDelta;
use engine_config::settings::ReconcileSettings;
use engine_core::{
    retry::RetryPolicy,
    state::{JobStore, memory::InMemoryJobStore},
};
use engine_runtime::{controller::JobController, reconcile::ReconcileContext};
use model::{
    job::ReconciliationJob,
    mapping::{
        field::{FieldMapping, TargetType, TransformFunction},
        registry::MappingRegistry,
    },
    records::record::Record,
};
use std::{sync::Arc, time::Duration};

/// Mappings used across the scenarios: lead title, age, VIP flag, scouter.
pub fn lead_registry() -> MappingRegistry {
    MappingRegistry::new(vec![
        FieldMapping::new(
            "m-title",
            "TITLE",
            "title",
            TransformFunction::ToString,
            TargetType::Text,
        ),
        FieldMapping::new(
            "m-age",
            "UF_CRM_AGE",
            "age",
            TransformFunction::ToNumber,
            TargetType::Integer,
        ),
        FieldMapping::new(
            "m-vip",
            "UF_CRM_VIP",
            "is_vip",
            TransformFunction::ToBoolean,
            TargetType::Boolean,
        ),
        FieldMapping::new(
            "m-scouter",
            REMOTE_SCOUTER,
            "scouter_name",
            TransformFunction::Identity,
            TargetType::Text,
        ),
    ])
}

/// A lead with ids `1..=n` all belonging to `scouter`.
pub fn leads(n: usize, scouter: &str) -> Vec<Record> {
    (1..=n)
        .map(|i| {
            Record::new(i.to_string())
                .with_field("ID", i.to_string())
                .with_field("TITLE", format!("Lead {i}"))
                .with_field("UF_CRM_AGE", (20 + i % 40).to_string())
                .with_field("UF_CRM_VIP", if i % 2 == 0 { "Y" } else { "N" })
                .with_field(REMOTE_SCOUTER, scouter)
        })
        .collect()
}

/// Settings tuned for tests: no backoff delay, short timeouts.
pub fn fast_settings() -> ReconcileSettings {
    ReconcileSettings {
        import_concurrency: 4,
        heartbeat_every: 5,
        call_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        ..ReconcileSettings::default()
    }
}

pub struct Harness {
    pub controller: JobController,
    pub store: Arc<dyn JobStore>,
    pub remote: Arc<FakeRemote>,
    pub local: Arc<FakeLocal>,
}

impl Harness {
    pub fn new(remote: FakeRemote, local: FakeLocal) -> Self {
        Self::with_settings(remote, local, fast_settings())
    }

    pub fn with_settings(remote: FakeRemote, local: FakeLocal, settings: ReconcileSettings) -> Self {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        Self::with_store(remote, local, settings, store)
    }

    pub fn with_store(
        remote: FakeRemote,
        local: FakeLocal,
        settings: ReconcileSettings,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let remote = Arc::new(remote);
        let local = Arc::new(local);
        let ctx = ReconcileContext {
            remote: remote.clone(),
            local: local.clone(),
            store: store.clone(),
            registry: Arc::new(lead_registry()),
            settings,
        };
        Self {
            controller: JobController::new(ctx),
            store,
            remote,
            local,
        }
    }

    pub async fn job(&self, id: &str) -> ReconciliationJob {
        self.controller.job(id).await.expect("job exists")
    }

    /// Polls the store until `done` holds, failing the test after two seconds.
    pub async fn wait_until<F>(&self, id: &str, done: F) -> ReconciliationJob
    where
        F: Fn(&ReconciliationJob) -> bool,
    {
        for _ in 0..200 {
            let job = self.job(id).await;
            if done(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached the expected state: {:?}", self.job(id).await);
    }
}

/// Threshold under which a job counts as stalled almost immediately.
pub fn tiny_stall_threshold() -> TimeDelta {
    TimeDelta::milliseconds(30)
}
