use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secwatch_core::alert::AlertPredicate;
use secwatch_core::entity::{fleet_ids, EntityKind};
use secwatch_core::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use secwatch_core::types::EntityId;
use secwatch_events::EmailConfig;

use crate::scheduler::MonitorSettings;
use crate::sources::health::HEALTH_ENTITIES;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// What the monitor polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// Poll every camera, door and intercom over the device HTTP API.
    Devices,
    /// Evaluate failure counts over a trailing window of stored observations.
    Health,
}

impl FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devices" => Ok(Self::Devices),
            "health" => Ok(Self::Health),
            other => Err(format!("expected 'devices' or 'health', got '{other}'")),
        }
    }
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub mode: MonitorMode,
    pub database_url: String,
    pub device_api_base_url: String,
    pub camera_count: usize,
    pub door_count: usize,
    pub intercom_count: usize,
    pub poll_interval: Duration,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub health_window: Duration,
    pub retry: RetryPolicy,
    pub predicate: AlertPredicate,
    /// Logistic model file; the rule scorer is used when unset.
    pub model_path: Option<PathBuf>,
    pub metrics_addr: SocketAddr,
    pub email: Option<EmailConfig>,
    pub webhook_url: Option<String>,
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default                              |
    /// |-------------------------|--------------------------------------|
    /// | `MONITOR_MODE`          | `devices`                            |
    /// | `DATABASE_URL`          | required                             |
    /// | `DEVICE_API_BASE_URL`   | `http://api.example.com`             |
    /// | `CAMERA_COUNT`          | `200`                                |
    /// | `DOOR_COUNT`            | `50`                                 |
    /// | `INTERCOM_COUNT`        | `20`                                 |
    /// | `POLL_INTERVAL_SECS`    | `60` (`600` in health mode)          |
    /// | `FETCH_CONCURRENCY`     | `32`                                 |
    /// | `FETCH_TIMEOUT_SECS`    | `10`                                 |
    /// | `HEALTH_WINDOW_MINS`    | `10`                                 |
    /// | `RETRY_MAX_ATTEMPTS`    | `3`                                  |
    /// | `RETRY_BASE_DELAY_SECS` | `2`                                  |
    /// | `ALERT_PREDICATE`       | `count:1`                            |
    /// | `MODEL_PATH`            | unset                                |
    /// | `METRICS_ADDR`          | `0.0.0.0:8001`                       |
    /// | `ALERT_WEBHOOK_URL`     | unset                                |
    ///
    /// SMTP variables are documented on [`EmailConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode: MonitorMode = parse_or(&get, "MONITOR_MODE", MonitorMode::Devices)?;
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let default_interval = match mode {
            MonitorMode::Devices => 60,
            MonitorMode::Health => 600,
        };
        let poll_interval_secs: u64 = parse_or(&get, "POLL_INTERVAL_SECS", default_interval)?;
        if poll_interval_secs == 0 {
            return Err(invalid("POLL_INTERVAL_SECS", "must be greater than zero"));
        }

        let fetch_concurrency: usize = parse_or(&get, "FETCH_CONCURRENCY", 32)?;
        if fetch_concurrency == 0 {
            return Err(invalid("FETCH_CONCURRENCY", "must be greater than zero"));
        }

        let fetch_timeout_secs: u64 = parse_or(&get, "FETCH_TIMEOUT_SECS", 10)?;
        if fetch_timeout_secs == 0 {
            return Err(invalid("FETCH_TIMEOUT_SECS", "must be greater than zero"));
        }

        let health_window_mins: u64 = parse_or(&get, "HEALTH_WINDOW_MINS", 10)?;
        if health_window_mins == 0 {
            return Err(invalid("HEALTH_WINDOW_MINS", "must be greater than zero"));
        }
        let health_window_secs = health_window_mins
            .checked_mul(60)
            .ok_or_else(|| invalid("HEALTH_WINDOW_MINS", "too large"))?;

        let max_attempts: u32 = parse_or(&get, "RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let base_delay_secs: u64 =
            parse_or(&get, "RETRY_BASE_DELAY_SECS", DEFAULT_BASE_DELAY.as_secs())?;
        let retry = RetryPolicy::new(max_attempts, Duration::from_secs(base_delay_secs))
            .map_err(|e| invalid("RETRY_MAX_ATTEMPTS/RETRY_BASE_DELAY_SECS", e))?;

        let predicate = match get("ALERT_PREDICATE") {
            Some(raw) => raw
                .parse::<AlertPredicate>()
                .map_err(|e| invalid("ALERT_PREDICATE", e))?,
            None => AlertPredicate::default(),
        };

        let metrics_addr: SocketAddr = parse_or(
            &get,
            "METRICS_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8001)),
        )?;

        Ok(Self {
            mode,
            database_url,
            device_api_base_url: get("DEVICE_API_BASE_URL")
                .unwrap_or_else(|| "http://api.example.com".into())
                .trim_end_matches('/')
                .to_string(),
            camera_count: parse_or(&get, "CAMERA_COUNT", 200)?,
            door_count: parse_or(&get, "DOOR_COUNT", 50)?,
            intercom_count: parse_or(&get, "INTERCOM_COUNT", 20)?,
            poll_interval: Duration::from_secs(poll_interval_secs),
            fetch_concurrency,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            health_window: Duration::from_secs(health_window_secs),
            retry,
            predicate,
            model_path: get("MODEL_PATH").map(PathBuf::from),
            metrics_addr,
            email: EmailConfig::from_lookup(&get),
            webhook_url: get("ALERT_WEBHOOK_URL"),
        })
    }

    /// The fixed entity set polled every cycle.
    pub fn entities(&self) -> Vec<EntityId> {
        match self.mode {
            MonitorMode::Devices => [
                (EntityKind::Camera, self.camera_count),
                (EntityKind::Door, self.door_count),
                (EntityKind::Intercom, self.intercom_count),
            ]
            .into_iter()
            .flat_map(|(kind, count)| fleet_ids(kind, count))
            .collect(),
            MonitorMode::Health => HEALTH_ENTITIES.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: self.poll_interval,
            fetch_concurrency: self.fetch_concurrency,
            fetch_timeout: self.fetch_timeout,
            retry: self.retry.clone(),
            predicate: self.predicate,
        }
    }
}

fn invalid(var: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}
