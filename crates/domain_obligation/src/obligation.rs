//! Obligation aggregate and its settlement state machine
//!
//! An obligation moves through `PENDING -> SETTLED -> PENDING -> ...` once
//! per period until its last installment is paid, at which point it becomes
//! `COMPLETED` and inactive for good.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use core_kernel::{AccountId, BillingPeriod, DueDay, DueDayPolicy, Money, ObligationId};
use domain_ledger::{BalanceAdjustment, EventSource, Flow, LedgerEvent};

use crate::error::ObligationError;

/// Kind of obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationKind {
    /// Paid once, at creation
    Single,
    /// A purchase split into a fixed number of installments
    Installment,
    /// A fixed amount repeated for a number of periods
    FixedRecurring,
}

impl ObligationKind {
    /// Kinds picked up by the periodic tick
    pub const RECURRING: [ObligationKind; 2] =
        [ObligationKind::Installment, ObligationKind::FixedRecurring];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationKind::Single => "SINGLE",
            ObligationKind::Installment => "INSTALLMENT",
            ObligationKind::FixedRecurring => "FIXED_RECURRING",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, ObligationKind::Single)
    }
}

impl FromStr for ObligationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE" => Ok(ObligationKind::Single),
            "INSTALLMENT" => Ok(ObligationKind::Installment),
            "FIXED_RECURRING" => Ok(ObligationKind::FixedRecurring),
            other => Err(format!("unknown obligation kind: {}", other)),
        }
    }
}

/// Obligation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObligationStatus {
    /// Waiting for the current period's settlement
    Pending,
    /// Settled for the current period
    Settled,
    /// Every installment has been paid
    Completed,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Pending => "PENDING",
            ObligationStatus::Settled => "SETTLED",
            ObligationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObligationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ObligationStatus::Pending),
            "SETTLED" => Ok(ObligationStatus::Settled),
            "COMPLETED" => Ok(ObligationStatus::Completed),
            other => Err(format!("unknown obligation status: {}", other)),
        }
    }
}

/// A recurring or multi-installment commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique identifier
    pub id: ObligationId,
    /// Account whose balance this obligation moves
    pub account_id: AccountId,
    /// Kind of obligation
    pub kind: ObligationKind,
    /// Expense or income
    pub flow: Flow,
    /// Description
    pub description: String,
    /// Total amount across all installments
    pub total_amount: Money,
    /// Amount of each installment except possibly the last
    pub installment_amount: Option<Money>,
    /// Number of installments
    pub total_installments: u32,
    /// Installments already paid
    pub current_installment: u32,
    /// Day-of-month anchor
    pub due_day: DueDay,
    /// Status
    pub status: ObligationStatus,
    /// Whether the obligation is still selectable
    pub active: bool,
    /// Date of the most recent settlement
    pub last_settled_at: Option<NaiveDate>,
    /// Business date the obligation was opened
    pub opened_on: NaiveDate,
    /// Optimistic concurrency version
    pub version: i64,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Result of settling one installment
///
/// Nothing is persisted yet: the caller commits all three parts together.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// The obligation after the transition
    pub obligation: Obligation,
    /// The event recording the payment
    pub event: LedgerEvent,
    /// The balance change caused by the payment
    pub adjustment: BalanceAdjustment,
}

impl Settlement {
    /// Returns true if this settlement paid the last installment
    pub fn completes(&self) -> bool {
        self.obligation.status == ObligationStatus::Completed
    }
}

impl Obligation {
    /// Returns true once every installment has been paid
    pub fn is_completed(&self) -> bool {
        self.status == ObligationStatus::Completed
    }

    /// Installments still to be paid
    pub fn remaining_installments(&self) -> u32 {
        self.total_installments.saturating_sub(self.current_installment)
    }

    /// Returns true if the last settlement happened in the same month as `date`
    pub fn settled_in_period_of(&self, date: NaiveDate) -> bool {
        self.last_settled_at
            .map(|last| BillingPeriod::containing(last) == BillingPeriod::containing(date))
            .unwrap_or(false)
    }

    /// Returns true if the obligation is SETTLED from a month before `today`
    pub fn needs_rollover(&self, today: NaiveDate) -> bool {
        self.active
            && self.status == ObligationStatus::Settled
            && self
                .last_settled_at
                .map_or(true, |last| {
                    BillingPeriod::containing(last) < BillingPeriod::containing(today)
                })
    }

    /// Moves a SETTLED obligation from a prior period back to PENDING
    ///
    /// Returns true if the status changed.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if !self.needs_rollover(today) {
            return false;
        }

        self.status = ObligationStatus::Pending;
        self.updated_at = Utc::now();

        debug!(obligation_id = %self.id, %today, "obligation rolled over to pending");
        true
    }

    /// Returns true if the obligation should be settled by the tick on `date`
    pub fn is_due_on(&self, date: NaiveDate, policy: DueDayPolicy) -> bool {
        self.active
            && self.status == ObligationStatus::Pending
            && policy.is_due_on(self.due_day, date)
    }

    /// Checks that the obligation carries what is needed to pay it
    ///
    /// # Returns
    ///
    /// The regular installment amount
    pub fn validate_payable(&self) -> Result<Money, ObligationError> {
        let installment = self.installment_amount.ok_or_else(|| ObligationError::NotPayable {
            id: self.id,
            reason: "installment amount is missing".to_string(),
        })?;

        if !installment.is_positive() {
            return Err(ObligationError::NotPayable {
                id: self.id,
                reason: format!("installment amount {} is not positive", installment),
            });
        }

        if installment.currency() != self.total_amount.currency() {
            return Err(ObligationError::NotPayable {
                id: self.id,
                reason: "installment and total amounts use different currencies".to_string(),
            });
        }

        if self.total_installments == 0 || self.current_installment >= self.total_installments {
            return Err(ObligationError::NotPayable {
                id: self.id,
                reason: format!(
                    "installment counter {}/{} leaves nothing to pay",
                    self.current_installment, self.total_installments
                ),
            });
        }

        Ok(installment)
    }

    /// Amount of the next installment
    ///
    /// The last installment absorbs the rounding remainder so that the paid
    /// installments add up to the total exactly.
    pub fn amount_due(&self) -> Result<Money, ObligationError> {
        let installment = self.validate_payable()?;

        if self.current_installment + 1 < self.total_installments {
            return Ok(installment);
        }

        let paid = installment.times(self.current_installment);
        let last = self.total_amount.checked_sub(&paid)?;
        if !last.is_positive() {
            return Err(ObligationError::NotPayable {
                id: self.id,
                reason: format!("final installment {} is not positive", last),
            });
        }

        Ok(last)
    }

    /// Description carried by the event of installment `number`
    pub fn event_description(&self, number: u32) -> String {
        if self.total_installments > 1 {
            format!("{} ({}/{})", self.description, number, self.total_installments)
        } else {
            self.description.clone()
        }
    }

    /// Settles the next installment on `date`
    ///
    /// # Errors
    ///
    /// - `AlreadyCompleted` when the obligation is completed or inactive
    /// - `AlreadySettled` when it was already settled in the month of `date`
    /// - `NotPayable` when the stored amounts or counters are malformed
    pub fn settle(
        &self,
        date: NaiveDate,
        policy: DueDayPolicy,
    ) -> Result<Settlement, ObligationError> {
        if !self.active || self.is_completed() {
            return Err(ObligationError::AlreadyCompleted(self.id));
        }

        if self.settled_in_period_of(date) {
            return Err(ObligationError::AlreadySettled {
                id: self.id,
                period: BillingPeriod::containing(date),
            });
        }

        let amount = self.amount_due()?;
        let number = self.current_installment + 1;

        let mut event = LedgerEvent::new(
            self.account_id,
            EventSource::Obligation(self.id),
            self.flow,
            amount,
            date,
        )
        .with_installment(number)
        .with_description(self.event_description(number));

        let due_date = BillingPeriod::containing(date).due_date(self.due_day, policy);
        if due_date.is_some_and(|due| due < date) {
            event = event.late();
        }

        let mut next = self.clone();
        next.current_installment = number;
        next.last_settled_at = Some(date);
        next.updated_at = Utc::now();
        if number >= self.total_installments {
            next.status = ObligationStatus::Completed;
            next.active = false;
        } else {
            next.status = ObligationStatus::Settled;
        }

        let adjustment = event.adjustment();

        Ok(Settlement {
            obligation: next,
            event,
            adjustment,
        })
    }

    /// Deactivates the obligation without any ledger effect
    pub fn cancel(&mut self) -> Result<(), ObligationError> {
        if self.is_completed() {
            return Err(ObligationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: "CANCELLED".to_string(),
            });
        }

        self.active = false;
        self.updated_at = Utc::now();
        Ok(())
    }
}
