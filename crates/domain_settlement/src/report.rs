//! Outcomes reported by the engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LedgerEventId, Money, ObligationId, RevenueId, TickId};
use domain_ledger::{EventSource, EventStatus, LedgerEvent};
use domain_obligation::Obligation;

/// An obligation or revenue the tick could not settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickIssue {
    pub source: EventSource,
    pub reason: String,
}

/// Summary of one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick_id: TickId,
    /// Business date the tick ran for
    pub today: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Obligations moved from SETTLED back to PENDING
    pub rolled_over: usize,
    /// Obligations settled by this tick
    pub settled: Vec<ObligationId>,
    /// Revenues received by this tick
    pub revenues_received: Vec<RevenueId>,
    /// Selected sources that turned out to be settled already
    pub duplicates: Vec<EventSource>,
    /// Malformed obligations skipped without retry
    pub defects: Vec<TickIssue>,
    /// Failures the next tick retries
    pub failures: Vec<TickIssue>,
}

impl TickReport {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            tick_id: TickId::new_v7(),
            today,
            started_at: Utc::now(),
            finished_at: None,
            rolled_over: 0,
            settled: Vec::new(),
            revenues_received: Vec::new(),
            duplicates: Vec::new(),
            defects: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Returns true if nothing was skipped or failed
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty() && self.failures.is_empty()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

/// Result of applying a payment to one obligation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// A new ledger event was committed
    Settled {
        event_id: LedgerEventId,
        installment_number: u32,
        status: EventStatus,
        /// True when this payment completed the obligation
        completed: bool,
        /// Account balance after the payment
        balance: Money,
    },
    /// The period was already settled; nothing changed
    AlreadySettled,
    /// The obligation is completed or inactive; nothing changed
    AlreadyCompleted,
}

impl PaymentOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentOutcome::Settled { .. })
    }
}

/// Result of opening an obligation
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// A recurring obligation waiting for its first due day
    Scheduled(Obligation),
    /// A single obligation settled on the spot
    Settled { event: LedgerEvent, balance: Money },
}

/// Result of receiving a revenue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Received {
        event_id: LedgerEventId,
        balance: Money,
    },
    AlreadyReceived,
}
