//! Ledger events
//!
//! A ledger event is the immutable record of one realized payment or
//! receipt. It keeps a weak reference to whatever produced it so that the
//! source can be looked up, but never owns it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{AccountId, LedgerEventId, Money, ObligationId, RevenueId};

use crate::balance::BalanceAdjustment;

/// Direction of a money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flow {
    /// Money leaving the account (expense)
    Outflow,
    /// Money entering the account (income)
    Inflow,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Outflow => "OUTFLOW",
            Flow::Inflow => "INFLOW",
        }
    }

    /// Applies the direction to an unsigned amount
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            Flow::Outflow => -amount.abs(),
            Flow::Inflow => amount.abs(),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OUTFLOW" => Ok(Flow::Outflow),
            "INFLOW" => Ok(Flow::Inflow),
            other => Err(format!("unknown flow: {}", other)),
        }
    }
}

/// Kind of aggregate that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    Obligation,
    Revenue,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Obligation => "OBLIGATION",
            SourceKind::Revenue => "REVENUE",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OBLIGATION" => Ok(SourceKind::Obligation),
            "REVENUE" => Ok(SourceKind::Revenue),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// Weak reference to the obligation or revenue an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventSource {
    Obligation(ObligationId),
    Revenue(RevenueId),
}

impl EventSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            EventSource::Obligation(_) => SourceKind::Obligation,
            EventSource::Revenue(_) => SourceKind::Revenue,
        }
    }

    /// Raw identifier of the source, as stored
    pub fn uuid(&self) -> Uuid {
        match self {
            EventSource::Obligation(id) => *id.as_uuid(),
            EventSource::Revenue(id) => *id.as_uuid(),
        }
    }

    /// Rebuilds a source from its stored parts
    pub fn from_parts(kind: SourceKind, id: Uuid) -> Self {
        match kind {
            SourceKind::Obligation => EventSource::Obligation(ObligationId::from_uuid(id)),
            SourceKind::Revenue => EventSource::Revenue(RevenueId::from_uuid(id)),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Obligation(id) => write!(f, "{}", id),
            EventSource::Revenue(id) => write!(f, "{}", id),
        }
    }
}

/// Whether the movement happened on time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Settled on (or before) its due date
    Settled,
    /// Settled after the due date of its period had passed
    Late,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Settled => "SETTLED",
            EventStatus::Late => "LATE",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SETTLED" => Ok(EventStatus::Settled),
            "LATE" => Ok(EventStatus::Late),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

/// An immutable record of money actually moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique event identifier
    pub id: LedgerEventId,
    /// Account whose balance moved
    pub account_id: AccountId,
    /// Originating obligation or revenue
    pub source: EventSource,
    /// Direction of the movement
    pub flow: Flow,
    /// Amount moved (always positive)
    pub amount: Money,
    /// Business date of the movement
    pub occurred_on: NaiveDate,
    /// 1-based installment number, when the source is an installment plan
    pub installment_number: Option<u32>,
    /// On-time or late
    pub status: EventStatus,
    /// Human-readable description
    pub description: String,
    /// When the event was created
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEvent {
    /// Creates a settled event for `amount` moved on `occurred_on`
    pub fn new(
        account_id: AccountId,
        source: EventSource,
        flow: Flow,
        amount: Money,
        occurred_on: NaiveDate,
    ) -> Self {
        Self {
            id: LedgerEventId::new_v7(),
            account_id,
            source,
            flow,
            amount: amount.abs(),
            occurred_on,
            installment_number: None,
            status: EventStatus::Settled,
            description: String::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Sets the installment number
    pub fn with_installment(mut self, number: u32) -> Self {
        self.installment_number = Some(number);
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the event as settled after its due date
    pub fn late(mut self) -> Self {
        self.status = EventStatus::Late;
        self
    }

    /// The balance change this event causes
    pub fn adjustment(&self) -> BalanceAdjustment {
        BalanceAdjustment::for_flow(self.account_id, self.flow, self.amount)
    }

    /// Signed amount of the movement
    pub fn signed_amount(&self) -> Money {
        self.flow.signed(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_amount_is_unsigned() {
        let event = LedgerEvent::new(
            AccountId::new(),
            EventSource::Obligation(ObligationId::new()),
            Flow::Outflow,
            Money::new(dec!(-12.50), Currency::BRL),
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
        );
        assert_eq!(event.amount.amount(), dec!(12.50));
        assert_eq!(event.signed_amount().amount(), dec!(-12.50));
    }

    #[test]
    fn test_source_round_trips_through_parts() {
        let source = EventSource::Revenue(RevenueId::new());
        let rebuilt = EventSource::from_parts(source.kind(), source.uuid());
        assert_eq!(source, rebuilt);
    }
}
