//! Worker configuration
//!
//! Settings are read from `WORKER_*` environment variables; nested keys use
//! `__` (for example `WORKER_DATABASE__MAX_CONNECTIONS`). Anything unset
//! keeps its default. Enumerated settings are parsed while loading, so an
//! unknown backend, timezone, policy, currency or log format fails there.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use core_kernel::{Currency, DueDayPolicy, Timezone};
use domain_settlement::EngineConfig;

use crate::error::WorkerError;

/// Storage behind the settlement ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Process-local store; state is lost on exit
    Memory,
    /// PostgreSQL through `infra_db`
    Postgres,
}

impl FromStr for Backend {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            other => Err(WorkerError::invalid("backend", format!("unknown backend '{}'", other))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(WorkerError::invalid("log_format", format!("unknown format '{}'", other))),
        }
    }
}

/// Connection pool settings for the postgres backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// PostgreSQL connection string
    pub url: String,
    pub max_connections: u32,
    /// Apply embedded migrations at startup
    pub migrate: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/settlement".to_string(),
            max_connections: 10,
            migrate: true,
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// `memory` or `postgres`
    #[serde(deserialize_with = "parsed")]
    pub backend: Backend,
    pub database: DatabaseSettings,
    /// Seconds between ticks
    pub tick_interval_secs: u64,
    /// IANA timezone deciding the business date
    #[serde(deserialize_with = "parsed")]
    pub timezone: Timezone,
    /// `clamp` or `skip`
    #[serde(deserialize_with = "parsed")]
    pub due_day_policy: DueDayPolicy,
    /// Currency of the in-memory ledger
    #[serde(deserialize_with = "parsed")]
    pub currency: Currency,
    /// Log level or filter directive
    pub log_level: String,
    #[serde(deserialize_with = "parsed")]
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database: DatabaseSettings::default(),
            tick_interval_secs: 86_400,
            timezone: Timezone::new(chrono_tz::America::Sao_Paulo),
            due_day_policy: DueDayPolicy::ClampToMonthEnd,
            currency: Currency::BRL,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// Deserializes a setting through its `FromStr` impl
fn parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse().map_err(serde::de::Error::custom)
}

impl WorkerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::load(None)
    }

    /// Loads configuration from the given variables instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, WorkerError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, WorkerError> {
        let config: WorkerConfig = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("WORKER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the numeric bounds
    pub fn validate(&self) -> Result<(), WorkerError> {
        self.tick_interval()?;
        if self.database.max_connections == 0 {
            return Err(WorkerError::invalid("database.max_connections", "must be at least 1"));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            due_day_policy: self.due_day_policy,
        }
    }

    pub fn tick_interval(&self) -> Result<Duration, WorkerError> {
        if self.tick_interval_secs == 0 {
            return Err(WorkerError::invalid("tick_interval_secs", "must be at least 1"));
        }
        Ok(Duration::from_secs(self.tick_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_vars(HashMap::new()).unwrap();

        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.tick_interval().unwrap(), Duration::from_secs(86_400));
        assert_eq!(config.engine_config().due_day_policy, DueDayPolicy::ClampToMonthEnd);
        assert_eq!(config.timezone, Timezone::new(chrono_tz::America::Sao_Paulo));
        assert_eq!(config.currency, Currency::BRL);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_environment_overrides() {
        let config = WorkerConfig::from_vars(vars(&[
            ("WORKER_BACKEND", "postgres"),
            ("WORKER_TICK_INTERVAL_SECS", "5"),
            ("WORKER_DUE_DAY_POLICY", "skip"),
            ("WORKER_TIMEZONE", "UTC"),
            ("WORKER_CURRENCY", "usd"),
            ("WORKER_LOG_FORMAT", "json"),
            ("WORKER_DATABASE__URL", "postgres://db/settlement"),
            ("WORKER_DATABASE__MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Postgres);
        assert_eq!(config.tick_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(config.due_day_policy, DueDayPolicy::Skip);
        assert_eq!(config.timezone, Timezone::new(chrono_tz::UTC));
        assert_eq!(config.currency, Currency::USD);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database.url, "postgres://db/settlement");
        assert_eq!(config.database.max_connections, 4);
        assert!(config.database.migrate);
    }

    #[test]
    fn test_unknown_values_fail_at_load() {
        for (key, value) in [
            ("WORKER_BACKEND", "redis"),
            ("WORKER_TIMEZONE", "Mars/Olympus"),
            ("WORKER_DUE_DAY_POLICY", "weekly"),
            ("WORKER_CURRENCY", "XYZ"),
            ("WORKER_LOG_FORMAT", "xml"),
        ] {
            let result = WorkerConfig::from_vars(vars(&[(key, value)]));
            assert!(matches!(result, Err(WorkerError::Config(_))), "{key}={value} was accepted");
        }
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = WorkerConfig::from_vars(vars(&[("WORKER_TICK_INTERVAL_SECS", "0")]));
        assert!(matches!(result, Err(WorkerError::InvalidSetting { .. })));
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let config = WorkerConfig {
            database: DatabaseSettings {
                max_connections: 0,
                ..DatabaseSettings::default()
            },
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
