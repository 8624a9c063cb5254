//! Settlement Ports
//!
//! This module defines what the settlement engine needs from storage. Every
//! trait extends [`DomainPort`] so adapters can be shared across tasks.
//!
//! # Adapters
//!
//! - **In-memory adapter**: [`crate::memory::InMemorySettlementStore`], used
//!   by tests and the worker's `memory` backend
//! - **PostgreSQL adapter**: `infra_db::PgSettlementStore`
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_settlement::{SettlementEngine, SettlementPorts};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PgSettlementStore::new(pool));
//! let engine = SettlementEngine::new(SettlementPorts::from_store(store), clock, config);
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use core_kernel::{
    AccountId, DomainPort, HealthCheckable, LedgerEventId, Money, ObligationId, PortError,
    RevenueId,
};
use domain_ledger::{Account, BalanceAdjustment, EventSource, LedgerEvent};
use domain_obligation::{
    Obligation, ObligationKind, ObligationStatus, Receipt, Revenue, Settlement,
};

/// Persisted collection of obligations
#[async_trait]
pub trait ObligationStore: DomainPort {
    /// Active obligations of the given kinds with this status and due day
    async fn find_active_by_status_and_due_day(
        &self,
        status: ObligationStatus,
        kinds: &[ObligationKind],
        due_day: u32,
    ) -> Result<Vec<Obligation>, PortError>;

    /// Every active obligation of the given kinds
    async fn find_active(&self, kinds: &[ObligationKind]) -> Result<Vec<Obligation>, PortError>;

    /// Retrieves an obligation by ID
    async fn find_by_id(&self, id: ObligationId) -> Result<Option<Obligation>, PortError>;

    /// Inserts a new obligation
    ///
    /// Returns `PortError::Conflict` if the id is taken
    async fn insert(&self, obligation: &Obligation) -> Result<(), PortError>;

    /// Saves an obligation whose `version` matches the stored one
    ///
    /// # Returns
    ///
    /// The stored obligation with its bumped version, or `PortError::Conflict`
    /// when the stored version moved on
    async fn save(&self, obligation: &Obligation) -> Result<Obligation, PortError>;
}

/// Running balance per account
#[async_trait]
pub trait BalanceLedger: DomainPort {
    /// Opens an account at its opening balance
    async fn open_account(&self, account: &Account) -> Result<(), PortError>;

    /// Adds a signed delta to the balance, returning the new balance
    async fn adjust(&self, account_id: AccountId, delta: Money) -> Result<Money, PortError>;

    /// Current balance, or None for an unknown account
    async fn balance(&self, account_id: AccountId) -> Result<Option<Money>, PortError>;
}

/// Append-only ledger event log
#[async_trait]
pub trait LedgerEventStore: DomainPort {
    /// Appends an event; `PortError::Conflict` if (source, occurred_on) exists
    async fn append(&self, event: &LedgerEvent) -> Result<(), PortError>;

    /// Returns true if an event exists for the source on that date
    async fn exists_for(&self, source: EventSource, occurred_on: NaiveDate)
        -> Result<bool, PortError>;

    /// Events produced by a source, oldest first
    async fn find_by_source(&self, source: EventSource) -> Result<Vec<LedgerEvent>, PortError>;
}

/// Persisted collection of revenues
#[async_trait]
pub trait RevenueStore: DomainPort {
    async fn insert(&self, revenue: &Revenue) -> Result<(), PortError>;

    /// Saves a revenue whose `version` matches the stored one
    async fn save(&self, revenue: &Revenue) -> Result<Revenue, PortError>;

    async fn find_by_id(&self, id: RevenueId) -> Result<Option<Revenue>, PortError>;

    /// Active PENDING revenues whose receipt date is on or before `today`
    async fn find_receivable(&self, today: NaiveDate) -> Result<Vec<Revenue>, PortError>;
}

/// Everything one settlement changes
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    /// Obligation state to save, None when no obligation row is kept
    pub obligation: Option<Obligation>,
    /// Revenue state to save
    pub revenue: Option<Revenue>,
    /// Event to append
    pub event: LedgerEvent,
    /// Balance change to apply
    pub adjustment: BalanceAdjustment,
}

impl SettlementCommit {
    /// Commit saving the obligation's next state
    pub fn for_obligation(settlement: Settlement) -> Self {
        Self {
            obligation: Some(settlement.obligation),
            revenue: None,
            event: settlement.event,
            adjustment: settlement.adjustment,
        }
    }

    /// Commit keeping only the event and balance change
    pub fn detached(settlement: Settlement) -> Self {
        Self {
            obligation: None,
            revenue: None,
            event: settlement.event,
            adjustment: settlement.adjustment,
        }
    }

    /// Commit saving the revenue's received state
    pub fn for_receipt(receipt: Receipt) -> Self {
        Self {
            obligation: None,
            revenue: Some(receipt.revenue),
            event: receipt.event,
            adjustment: receipt.adjustment,
        }
    }

    /// Account whose balance the commit moves
    pub fn account_id(&self) -> AccountId {
        self.adjustment.account_id
    }
}

/// What a successful commit produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub event_id: LedgerEventId,
    /// Balance after the adjustment
    pub balance: Money,
}

/// Atomic persistence of one settlement
#[async_trait]
pub trait SettlementUnitOfWork: DomainPort {
    /// Saves obligation/revenue state, appends the event and adjusts the
    /// balance, all or nothing
    ///
    /// # Errors
    ///
    /// - `PortError::NotFound` with entity type `Account` when the account is missing
    /// - `PortError::Conflict` on a stale version or a duplicate event
    async fn commit(&self, commit: SettlementCommit) -> Result<CommitOutcome, PortError>;
}

/// A single adapter implementing every settlement port
pub trait SettlementStore:
    ObligationStore
    + BalanceLedger
    + LedgerEventStore
    + RevenueStore
    + SettlementUnitOfWork
    + HealthCheckable
{
}

impl<T> SettlementStore for T where
    T: ObligationStore
        + BalanceLedger
        + LedgerEventStore
        + RevenueStore
        + SettlementUnitOfWork
        + HealthCheckable
{
}

/// The ports handed to the engine
#[derive(Clone)]
pub struct SettlementPorts {
    pub obligations: Arc<dyn ObligationStore>,
    pub events: Arc<dyn LedgerEventStore>,
    pub balances: Arc<dyn BalanceLedger>,
    pub revenues: Arc<dyn RevenueStore>,
    pub unit_of_work: Arc<dyn SettlementUnitOfWork>,
}

impl SettlementPorts {
    /// Uses one adapter for every port
    pub fn from_store<S: SettlementStore>(store: Arc<S>) -> Self {
        Self {
            obligations: store.clone(),
            events: store.clone(),
            balances: store.clone(),
            revenues: store.clone(),
            unit_of_work: store,
        }
    }
}
