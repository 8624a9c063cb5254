//! Revenues
//!
//! Incomes are not split into installments. A ONE_OFF revenue is received at
//! registration; a FIXED revenue waits until its receipt date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{AccountId, DueDay, DueDayPolicy, Money, RevenueId};
use domain_ledger::{BalanceAdjustment, EventSource, Flow, LedgerEvent};

use crate::error::ObligationError;

/// Kind of revenue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevenueKind {
    OneOff,
    Fixed,
}

impl RevenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueKind::OneOff => "ONE_OFF",
            RevenueKind::Fixed => "FIXED",
        }
    }
}

impl FromStr for RevenueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONE_OFF" => Ok(RevenueKind::OneOff),
            "FIXED" => Ok(RevenueKind::Fixed),
            other => Err(format!("unknown revenue kind: {}", other)),
        }
    }
}

/// Revenue status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevenueStatus {
    Pending,
    Received,
}

impl RevenueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueStatus::Pending => "PENDING",
            RevenueStatus::Received => "RECEIVED",
        }
    }
}

impl FromStr for RevenueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RevenueStatus::Pending),
            "RECEIVED" => Ok(RevenueStatus::Received),
            other => Err(format!("unknown revenue status: {}", other)),
        }
    }
}

/// An expected or realized income
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revenue {
    pub id: RevenueId,
    pub account_id: AccountId,
    pub kind: RevenueKind,
    pub description: String,
    pub amount: Money,
    /// Day-of-month the revenue is expected on, if any
    pub due_day: Option<DueDay>,
    /// Date from which the revenue may be received
    pub receipt_date: NaiveDate,
    pub status: RevenueStatus,
    pub received_on: Option<NaiveDate>,
    pub active: bool,
    pub registered_on: NaiveDate,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of receiving a revenue, committed as one unit
#[derive(Debug, Clone)]
pub struct Receipt {
    pub revenue: Revenue,
    pub event: LedgerEvent,
    pub adjustment: BalanceAdjustment,
}

impl Revenue {
    pub fn is_received(&self) -> bool {
        self.status == RevenueStatus::Received
    }

    /// Returns true if the revenue can be received on `today`
    pub fn is_receivable_on(&self, today: NaiveDate) -> bool {
        self.active && self.status == RevenueStatus::Pending && self.receipt_date <= today
    }

    /// Marks the revenue received and produces the crediting event
    pub fn receive(&self, today: NaiveDate) -> Result<Receipt, ObligationError> {
        if self.is_received() {
            return Err(ObligationError::AlreadyReceived(self.id));
        }

        if self.receipt_date > today {
            return Err(ObligationError::NotYetReceivable {
                id: self.id,
                receipt_date: self.receipt_date,
            });
        }

        if !self.amount.is_positive() {
            return Err(ObligationError::InvalidAmount(self.amount.to_string()));
        }

        let event = LedgerEvent::new(
            self.account_id,
            EventSource::Revenue(self.id),
            Flow::Inflow,
            self.amount,
            self.receipt_date,
        )
        .with_description(self.description.clone());

        let mut next = self.clone();
        next.status = RevenueStatus::Received;
        next.received_on = Some(self.receipt_date);
        next.updated_at = Utc::now();

        let adjustment = event.adjustment();

        Ok(Receipt {
            revenue: next,
            event,
            adjustment,
        })
    }
}

/// Request to register a revenue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRevenue {
    pub account_id: AccountId,
    pub kind: RevenueKind,
    pub description: String,
    pub amount: Money,
    pub due_day: Option<DueDay>,
    pub receipt_date: Option<NaiveDate>,
    pub registered_on: NaiveDate,
}

impl NewRevenue {
    /// An income received on registration
    pub fn one_off(
        account_id: AccountId,
        description: impl Into<String>,
        amount: Money,
        registered_on: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            kind: RevenueKind::OneOff,
            description: description.into(),
            amount,
            due_day: None,
            receipt_date: None,
            registered_on,
        }
    }

    /// An income expected on a receipt date
    pub fn fixed(
        account_id: AccountId,
        description: impl Into<String>,
        amount: Money,
        registered_on: NaiveDate,
    ) -> Self {
        Self {
            account_id,
            kind: RevenueKind::Fixed,
            description: description.into(),
            amount,
            due_day: None,
            receipt_date: None,
            registered_on,
        }
    }

    pub fn with_receipt_date(mut self, receipt_date: NaiveDate) -> Self {
        self.receipt_date = Some(receipt_date);
        self
    }

    pub fn with_due_day(mut self, due_day: DueDay) -> Self {
        self.due_day = Some(due_day);
        self
    }

    /// Validates the request and builds a PENDING revenue
    ///
    /// A FIXED revenue without an explicit receipt date is expected on the
    /// next occurrence of its due day.
    pub fn register(self, policy: DueDayPolicy) -> Result<Revenue, ObligationError> {
        if !self.amount.is_positive() {
            return Err(ObligationError::InvalidAmount(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }

        let receipt_date = match self.kind {
            RevenueKind::OneOff => self.registered_on,
            RevenueKind::Fixed => self
                .receipt_date
                .or_else(|| {
                    self.due_day
                        .and_then(|day| policy.next_occurrence(day, self.registered_on))
                })
                .ok_or(ObligationError::MissingReceiptDate)?,
        };

        let now = Utc::now();
        Ok(Revenue {
            id: RevenueId::new_v7(),
            account_id: self.account_id,
            kind: self.kind,
            description: self.description,
            amount: self.amount,
            due_day: self.due_day,
            receipt_date,
            status: RevenueStatus::Pending,
            received_on: None,
            active: true,
            registered_on: self.registered_on,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }
}
