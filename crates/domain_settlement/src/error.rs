//! Settlement errors

use thiserror::Error;

use core_kernel::{AccountId, PortError};
use domain_obligation::ObligationError;

/// Errors surfaced by the settlement engine
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed obligation or revenue; skipped and never retried
    #[error("Validation defect on {id}: {reason}")]
    ValidationDefect { id: String, reason: String },

    /// Unknown obligation or revenue id
    #[error("Not found: {0}")]
    NotFound(String),

    /// The owning account has no balance
    #[error("No balance owner for account {0}")]
    MissingAccount(AccountId),

    /// Optimistic version or uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another tick holds the tick guard
    #[error("A settlement tick is already running")]
    TickInProgress,

    #[error("Obligation error: {0}")]
    Obligation(ObligationError),

    #[error("Port error: {0}")]
    Port(PortError),
}

impl SettlementError {
    /// Returns true for outcomes that mean "someone else already did it"
    pub fn is_conflict(&self) -> bool {
        matches!(self, SettlementError::Conflict(_))
    }

    /// Returns true for failures the next tick may retry
    pub fn is_retryable(&self) -> bool {
        match self {
            SettlementError::MissingAccount(_) | SettlementError::Conflict(_) => true,
            SettlementError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<ObligationError> for SettlementError {
    fn from(error: ObligationError) -> Self {
        match error {
            ObligationError::NotPayable { id, reason } => SettlementError::ValidationDefect {
                id: id.to_string(),
                reason,
            },
            other => SettlementError::Obligation(other),
        }
    }
}

impl From<PortError> for SettlementError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Conflict { message } => SettlementError::Conflict(message),
            PortError::NotFound { entity_type, id } => {
                SettlementError::NotFound(format!("{} {}", entity_type, id))
            }
            other => SettlementError::Port(other),
        }
    }
}

impl SettlementError {
    /// Maps a unit-of-work failure, naming the account when it is the missing entity
    pub(crate) fn from_commit(error: PortError, account_id: AccountId) -> Self {
        match error {
            PortError::NotFound { ref entity_type, .. } if entity_type == "Account" => {
                SettlementError::MissingAccount(account_id)
            }
            other => other.into(),
        }
    }
}
