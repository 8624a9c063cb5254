//! Obligation domain errors

use thiserror::Error;

use core_kernel::{BillingPeriod, CalendarError, MoneyError, ObligationId, RevenueId};

/// Errors that can occur in the obligation domain
#[derive(Debug, Error)]
pub enum ObligationError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid installment count: {0}")]
    InvalidInstallmentCount(u32),

    /// The obligation carries data that makes it impossible to pay
    #[error("Obligation {id} cannot be paid: {reason}")]
    NotPayable { id: ObligationId, reason: String },

    #[error("Obligation {0} is already completed or inactive")]
    AlreadyCompleted(ObligationId),

    #[error("Obligation {id} was already settled in {period}")]
    AlreadySettled { id: ObligationId, period: BillingPeriod },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Revenue {0} was already received")]
    AlreadyReceived(RevenueId),

    #[error("Revenue {id} is not receivable before {receipt_date}")]
    NotYetReceivable {
        id: RevenueId,
        receipt_date: chrono::NaiveDate,
    },

    #[error("Revenue needs a receipt date or a due day")]
    MissingReceiptDate,

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
}
