use crate::{env::EnvContext, error::SettingsError};
use chrono::TimeDelta;
use engine_core::{progress::DEFAULT_STALL_THRESHOLD, retry::RetryPolicy};
use model::job::JobStatus;
use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::debug;

pub const ENV_STALL_THRESHOLD_SECS: &str = "CRMSYNC_STALL_THRESHOLD_SECS";
pub const ENV_IMPORT_CONCURRENCY: &str = "CRMSYNC_IMPORT_CONCURRENCY";
pub const ENV_HEARTBEAT_EVERY: &str = "CRMSYNC_HEARTBEAT_EVERY";
pub const ENV_CALL_TIMEOUT_SECS: &str = "CRMSYNC_CALL_TIMEOUT_SECS";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "CRMSYNC_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "CRMSYNC_RETRY_BASE_DELAY_MS";
pub const ENV_TERMINATE_AS: &str = "CRMSYNC_TERMINATE_AS";
pub const ENV_MAX_ERROR_DETAILS: &str = "CRMSYNC_MAX_ERROR_DETAILS";

pub const ENV_BITRIX_WEBHOOK: &str = "CRMSYNC_BITRIX_WEBHOOK";
pub const ENV_BITRIX_ENTITY: &str = "CRMSYNC_BITRIX_ENTITY";
pub const ENV_REMOTE_SCOUTER_FIELD: &str = "CRMSYNC_REMOTE_SCOUTER_FIELD";
pub const ENV_REMOTE_DATE_FIELD: &str = "CRMSYNC_REMOTE_DATE_FIELD";
pub const ENV_LOCAL_SCOUTER_FIELD: &str = "CRMSYNC_LOCAL_SCOUTER_FIELD";
pub const ENV_LOCAL_DATE_FIELD: &str = "CRMSYNC_LOCAL_DATE_FIELD";
pub const ENV_STATE_DIR: &str = "CRMSYNC_STATE_DIR";

const MAX_IMPORT_CONCURRENCY: usize = 16;

/// Status a stalled job is forced into by `terminate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminatePolicy {
    #[default]
    Fail,
    Cancel,
}

impl TerminatePolicy {
    pub fn status(&self) -> JobStatus {
        match self {
            TerminatePolicy::Fail => JobStatus::Failed,
            TerminatePolicy::Cancel => JobStatus::Cancelled,
        }
    }
}

impl FromStr for TerminatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "failed" | "fail" => Ok(TerminatePolicy::Fail),
            "cancelled" | "canceled" | "cancel" => Ok(TerminatePolicy::Cancel),
            other => Err(format!("expected 'failed' or 'cancelled', got '{other}'")),
        }
    }
}

/// Tuning knobs of the reconciliation job machinery.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub stall_threshold: TimeDelta,
    /// Worker count for the import stage.
    pub import_concurrency: usize,
    /// Heartbeat is written after this many imported records.
    pub heartbeat_every: usize,
    /// Upper bound for any single remote or local call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub terminate_as: TerminatePolicy,
    pub max_error_details: usize,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            import_concurrency: 4,
            heartbeat_every: 25,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            terminate_as: TerminatePolicy::Fail,
            max_error_details: 10_000,
        }
    }
}

impl ReconcileSettings {
    /// Defaults overridden by whatever `CRMSYNC_*` variables are present.
    pub fn from_env(env: &EnvContext) -> Result<Self, SettingsError> {
        let defaults = Self::default();

        let stall_secs = parse_or(env, ENV_STALL_THRESHOLD_SECS, 180i64)?;
        if stall_secs <= 0 {
            return Err(invalid(ENV_STALL_THRESHOLD_SECS, stall_secs, "must be positive"));
        }
        let stall_threshold = TimeDelta::try_seconds(stall_secs)
            .ok_or_else(|| invalid(ENV_STALL_THRESHOLD_SECS, stall_secs, "out of range"))?;

        let import_concurrency = parse_or(env, ENV_IMPORT_CONCURRENCY, defaults.import_concurrency)?
            .clamp(1, MAX_IMPORT_CONCURRENCY);
        let heartbeat_every = parse_or(env, ENV_HEARTBEAT_EVERY, defaults.heartbeat_every)?.max(1);
        let timeout_secs = parse_or(env, ENV_CALL_TIMEOUT_SECS, 30u64)?;
        if timeout_secs == 0 {
            return Err(invalid(ENV_CALL_TIMEOUT_SECS, timeout_secs, "must be positive"));
        }

        let attempts = parse_or(env, ENV_RETRY_MAX_ATTEMPTS, defaults.retry.max_attempts)?;
        let base_delay_ms = parse_or(env, ENV_RETRY_BASE_DELAY_MS, 200u64)?;
        let retry = RetryPolicy::new(
            attempts,
            Duration::from_millis(base_delay_ms),
            defaults.retry.max_delay,
        );

        let terminate_as = match env.get(ENV_TERMINATE_AS) {
            Some(raw) => raw
                .parse::<TerminatePolicy>()
                .map_err(|reason| invalid(ENV_TERMINATE_AS, &raw, &reason))?,
            None => defaults.terminate_as,
        };

        let max_error_details = parse_or(env, ENV_MAX_ERROR_DETAILS, defaults.max_error_details)?;

        let settings = Self {
            stall_threshold,
            import_concurrency,
            heartbeat_every,
            call_timeout: Duration::from_secs(timeout_secs),
            retry,
            terminate_as,
            max_error_details,
        };
        debug!(?settings, "Resolved reconcile settings");
        Ok(settings)
    }

    /// Longest an importing job goes without writing progress while records
    /// still complete.
    pub fn heartbeat_interval(&self) -> Duration {
        (self.stall_threshold / 3).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Where records come from and which fields carry the job filters.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Inbound webhook base URL, e.g. `https://acme.bitrix24.ru/rest/1/abc123`.
    pub bitrix_webhook: Option<String>,
    /// CRM entity the ids belong to (`lead`, `deal`, ...).
    pub entity: String,
    pub remote_scouter_field: String,
    pub remote_date_field: String,
    pub local_scouter_field: String,
    pub local_date_field: String,
    pub state_dir: Option<PathBuf>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            bitrix_webhook: None,
            entity: "lead".to_string(),
            remote_scouter_field: "UF_CRM_SCOUTER".to_string(),
            remote_date_field: "DATE_CREATE".to_string(),
            local_scouter_field: "scouter_name".to_string(),
            local_date_field: "created_at".to_string(),
            state_dir: None,
        }
    }
}

impl ConnectorSettings {
    pub fn from_env(env: &EnvContext) -> Self {
        let defaults = Self::default();
        Self {
            bitrix_webhook: env.get(ENV_BITRIX_WEBHOOK).filter(|s| !s.trim().is_empty()),
            entity: env.get_or(ENV_BITRIX_ENTITY, &defaults.entity),
            remote_scouter_field: env.get_or(ENV_REMOTE_SCOUTER_FIELD, &defaults.remote_scouter_field),
            remote_date_field: env.get_or(ENV_REMOTE_DATE_FIELD, &defaults.remote_date_field),
            local_scouter_field: env.get_or(ENV_LOCAL_SCOUTER_FIELD, &defaults.local_scouter_field),
            local_date_field: env.get_or(ENV_LOCAL_DATE_FIELD, &defaults.local_date_field),
            state_dir: env.get(ENV_STATE_DIR).map(PathBuf::from),
        }
    }

    pub fn require_webhook(&self) -> Result<&str, SettingsError> {
        self.bitrix_webhook
            .as_deref()
            .ok_or_else(|| SettingsError::Missing(ENV_BITRIX_WEBHOOK.to_string()))
    }
}

fn parse_or<T>(env: &EnvContext, key: &str, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: impl std::fmt::Display, reason: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
