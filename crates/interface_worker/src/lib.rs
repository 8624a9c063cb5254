//! Settlement Worker
//!
//! Wires a storage backend, the settlement engine and the tick scheduler
//! into one long-running process.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_worker::{Worker, WorkerConfig};
//!
//! let config = WorkerConfig::from_env()?;
//! let worker = Worker::build(&config).await?;
//! let ticks = worker.run(shutdown_rx).await;
//! ```

pub mod config;
pub mod error;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use core_kernel::{Clock, HealthCheckResult, HealthCheckable, SystemClock};
use domain_settlement::{
    EngineConfig, InMemorySettlementStore, SettlementEngine, SettlementPorts, SettlementStore,
    TickScheduler,
};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgSettlementStore};

pub use crate::config::{Backend, LogFormat, WorkerConfig};
pub use crate::error::WorkerError;

/// A configured engine plus the schedule it runs on
pub struct Worker {
    engine: Arc<SettlementEngine>,
    store: Arc<dyn HealthCheckable>,
    interval: Duration,
}

impl Worker {
    /// Builds the worker for the configured backend
    ///
    /// For the postgres backend this connects the pool and, unless
    /// disabled, applies the embedded migrations.
    pub async fn build(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.timezone));
        let engine_config = config.engine_config();
        let interval = config.tick_interval()?;

        match config.backend {
            Backend::Memory => {
                let store = Arc::new(InMemorySettlementStore::new(config.currency));
                info!(backend = "memory", "settlement store ready");
                Ok(Self::from_store(store, clock, engine_config, interval))
            }
            Backend::Postgres => {
                let pool = create_pool(
                    DatabaseConfig::new(config.database.url.clone())
                        .max_connections(config.database.max_connections),
                )
                .await?;
                if config.database.migrate {
                    run_migrations(&pool).await?;
                }
                let store = Arc::new(PgSettlementStore::new(pool));
                info!(backend = "postgres", "settlement store ready");
                Ok(Self::from_store(store, clock, engine_config, interval))
            }
        }
    }

    /// Builds the worker over an existing store
    pub fn from_store<S: SettlementStore>(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        interval: Duration,
    ) -> Self {
        let ports = SettlementPorts::from_store(store.clone());
        Self {
            engine: Arc::new(SettlementEngine::new(ports, clock, config)),
            store,
            interval,
        }
    }

    pub fn engine(&self) -> &Arc<SettlementEngine> {
        &self.engine
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn health(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    /// Runs ticks until `shutdown` turns true; returns the completed tick count
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> u64 {
        let health = self.health().await;
        if health.is_healthy() {
            info!(adapter = %health.adapter_id, latency_ms = health.latency_ms, "store healthy");
        } else {
            warn!(
                adapter = %health.adapter_id,
                status = ?health.status,
                message = health.message.as_deref().unwrap_or(""),
                "store not healthy at startup"
            );
        }

        TickScheduler::new(self.engine, self.interval)
            .run(shutdown)
            .await
    }
}
