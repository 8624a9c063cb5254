//! Opening new obligations

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, DueDay, DueDayPolicy, Money, ObligationId};
use domain_ledger::Flow;

use crate::error::ObligationError;
use crate::obligation::{Obligation, ObligationKind, ObligationStatus, Settlement};

/// Request to open an obligation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObligation {
    /// Owning account
    pub account_id: AccountId,
    /// Kind of obligation
    pub kind: ObligationKind,
    /// Expense or income
    pub flow: Flow,
    /// Description
    pub description: String,
    /// Total for INSTALLMENT and SINGLE, per-period amount for FIXED_RECURRING
    pub amount: Money,
    /// Installments for INSTALLMENT, periods for FIXED_RECURRING
    pub installments: u32,
    /// Day-of-month anchor
    pub due_day: DueDay,
    /// Business date of creation
    pub opened_on: NaiveDate,
}

/// What opening an obligation produced
#[derive(Debug, Clone)]
pub enum Opened {
    /// A recurring obligation to be inserted as PENDING
    Recurring(Obligation),
    /// A single obligation settled on the spot; only the event and the
    /// balance change are kept
    Settled(Settlement),
}

impl NewObligation {
    /// A purchase of `total` split into `installments` payments
    pub fn installment(
        account_id: AccountId,
        description: impl Into<String>,
        total: Money,
        installments: u32,
        due_day: DueDay,
        opened_on: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            kind: ObligationKind::Installment,
            flow: Flow::Outflow,
            description: description.into(),
            amount: total,
            installments,
            due_day,
            opened_on,
        }
    }

    /// A fixed `per_period` amount repeated for `periods` months
    pub fn fixed_recurring(
        account_id: AccountId,
        description: impl Into<String>,
        per_period: Money,
        periods: u32,
        due_day: DueDay,
        opened_on: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            kind: ObligationKind::FixedRecurring,
            flow: Flow::Outflow,
            description: description.into(),
            amount: per_period,
            installments: periods,
            due_day,
            opened_on,
        }
    }

    /// A one-time payment made on `on`
    pub fn single(
        account_id: AccountId,
        description: impl Into<String>,
        amount: Money,
        on: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            kind: ObligationKind::Single,
            flow: Flow::Outflow,
            description: description.into(),
            amount,
            installments: 1,
            due_day: DueDay::of(on),
            opened_on: on,
        }
    }

    /// Sets the direction of the money movement
    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    /// Total amount owed across all installments
    pub fn total_amount(&self) -> Money {
        match self.kind {
            ObligationKind::FixedRecurring => self.amount.times(self.installments),
            ObligationKind::Installment | ObligationKind::Single => self.amount,
        }
    }

    /// Validates the request and builds the obligation
    ///
    /// SINGLE obligations are settled immediately on `opened_on`.
    pub fn open(self, policy: DueDayPolicy) -> Result<Opened, ObligationError> {
        if !self.amount.is_positive() {
            return Err(ObligationError::InvalidAmount(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }

        let installments = match self.kind {
            ObligationKind::Single => 1,
            _ if self.installments == 0 => {
                return Err(ObligationError::InvalidInstallmentCount(0));
            }
            _ => self.installments,
        };

        let total_amount = self.total_amount();
        let installment_amount = total_amount.installment_share(installments)?;
        if !installment_amount.is_positive() {
            return Err(ObligationError::InvalidAmount(format!(
                "{} split in {} installments rounds to zero",
                total_amount, installments
            )));
        }

        let last_installment =
            total_amount.checked_sub(&installment_amount.times(installments - 1))?;
        if !last_installment.is_positive() {
            return Err(ObligationError::InvalidAmount(format!(
                "{} split in {} installments leaves a final installment of {}",
                total_amount, installments, last_installment
            )));
        }

        let now = Utc::now();
        let obligation = Obligation {
            id: ObligationId::new_v7(),
            account_id: self.account_id,
            kind: self.kind,
            flow: self.flow,
            description: self.description,
            total_amount,
            installment_amount: Some(installment_amount),
            total_installments: installments,
            current_installment: 0,
            due_day: self.due_day,
            status: ObligationStatus::Pending,
            active: true,
            last_settled_at: None,
            opened_on: self.opened_on,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        match obligation.kind {
            ObligationKind::Single => Ok(Opened::Settled(
                obligation.settle(obligation.opened_on, policy)?,
            )),
            ObligationKind::Installment | ObligationKind::FixedRecurring => {
                Ok(Opened::Recurring(obligation))
            }
        }
    }
}
