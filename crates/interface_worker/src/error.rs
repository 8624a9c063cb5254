//! Worker error handling

use thiserror::Error;

use domain_settlement::SettlementError;
use infra_db::DatabaseError;

/// Worker error types
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Logging setup failed: {0}")]
    Telemetry(String),
}

impl WorkerError {
    pub fn invalid(key: &str, reason: impl std::fmt::Display) -> Self {
        WorkerError::InvalidSetting {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
