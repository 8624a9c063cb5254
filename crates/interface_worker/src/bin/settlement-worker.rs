//! Settlement Worker Binary
//!
//! Runs the settlement tick on a fixed interval until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store, one tick every five seconds
//! WORKER_TICK_INTERVAL_SECS=5 cargo run --bin settlement-worker
//!
//! # PostgreSQL store
//! WORKER_BACKEND=postgres WORKER_DATABASE__URL=postgres://... cargo run --bin settlement-worker
//! ```
//!
//! # Environment Variables
//!
//! * `WORKER_BACKEND` - `memory` or `postgres` (default: memory)
//! * `WORKER_DATABASE__URL` - PostgreSQL connection string
//! * `WORKER_DATABASE__MAX_CONNECTIONS` - Pool size (default: 10)
//! * `WORKER_DATABASE__MIGRATE` - Apply migrations at startup (default: true)
//! * `WORKER_TICK_INTERVAL_SECS` - Seconds between ticks (default: 86400)
//! * `WORKER_TIMEZONE` - IANA timezone for the business date (default: America/Sao_Paulo)
//! * `WORKER_DUE_DAY_POLICY` - `clamp` or `skip` (default: clamp)
//! * `WORKER_CURRENCY` - Currency of the in-memory ledger (default: BRL)
//! * `WORKER_LOG_LEVEL` - Log filter (default: info)
//! * `WORKER_LOG_FORMAT` - `text` or `json` (default: text)

use anyhow::Context;
use tokio::sync::watch;

use interface_worker::{telemetry, Worker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("loading worker configuration")?;
    telemetry::init_tracing(&config.log_level, config.log_format)?;

    tracing::info!(
        backend = ?config.backend,
        tick_interval_secs = config.tick_interval_secs,
        timezone = %config.timezone.0,
        due_day_policy = ?config.due_day_policy,
        "Starting settlement worker"
    );

    let worker = Worker::build(&config)
        .await
        .context("building settlement worker")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    shutdown_signal().await?;
    shutdown_tx.send(true).ok();

    let ticks = handle.await.context("scheduler task panicked")?;
    tracing::info!(ticks, "Settlement worker shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("installing SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("installing Ctrl+C handler")?;
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("installing Ctrl+C handler")?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}
