//! Periodic tick scheduler

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::engine::SettlementEngine;
use crate::error::SettlementError;

/// Runs a tick every `interval` until shutdown is signalled
///
/// Each tick is awaited before the next interval starts; intervals missed
/// while a tick was running are skipped.
pub struct TickScheduler {
    engine: Arc<SettlementEngine>,
    interval: Duration,
}

impl TickScheduler {
    pub fn new(engine: Arc<SettlementEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Runs until `shutdown` turns true or its sender is dropped
    ///
    /// Returns the number of ticks that completed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.interval.as_millis() as u64, "tick scheduler started");
        let mut completed = 0u64;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    let today = self.engine.today();
                    match self.engine.run_tick(today).await {
                        Ok(report) if report.is_clean() => completed += 1,
                        Ok(report) => {
                            completed += 1;
                            warn!(
                                tick_id = %report.tick_id,
                                defects = report.defects.len(),
                                failures = report.failures.len(),
                                "tick finished with issues"
                            );
                        }
                        Err(SettlementError::TickInProgress) => {
                            warn!("previous tick still running, skipping");
                        }
                        Err(e) => error!(error = %e, "tick failed"),
                    }
                }
            }
        }

        info!(ticks = completed, "tick scheduler stopped");
        completed
    }

    /// Spawns the scheduler on the current runtime
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}
