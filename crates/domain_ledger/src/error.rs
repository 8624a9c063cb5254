//! Ledger domain errors

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Account is closed for new movements
    #[error("Account is inactive: {0}")]
    AccountInactive(String),

    /// An event for the same source and date was already recorded
    #[error("Duplicate ledger event for {event_source} on {occurred_on}")]
    DuplicateEvent {
        event_source: String,
        occurred_on: NaiveDate,
    },

    /// Event amounts must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Calculation error
    #[error("Calculation error: {0}")]
    CalculationError(String),
}
