//! In-memory settlement store
//!
//! Implements every settlement port over plain collections guarded by one
//! async mutex, so a commit is atomic with respect to every other call.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::Mutex;

use core_kernel::{
    AccountId, Currency, DomainPort, HealthCheckResult, HealthCheckable, Money,
    ObligationId, PortError, RevenueId,
};
use domain_ledger::{Account, BalanceAdjustment, EventSource, Ledger, LedgerError, LedgerEvent, Reconciliation};
use domain_obligation::{Obligation, ObligationKind, ObligationStatus, Revenue, RevenueStatus};

use crate::ports::{
    BalanceLedger, CommitOutcome, LedgerEventStore, ObligationStore, RevenueStore,
    SettlementCommit, SettlementUnitOfWork,
};

#[derive(Debug)]
struct MemoryState {
    obligations: HashMap<ObligationId, Obligation>,
    revenues: HashMap<RevenueId, Revenue>,
    ledger: Ledger,
}

/// Settlement store kept entirely in memory
#[derive(Debug)]
pub struct InMemorySettlementStore {
    state: Mutex<MemoryState>,
}

impl Default for InMemorySettlementStore {
    fn default() -> Self {
        Self::new(Currency::BRL)
    }
}

impl InMemorySettlementStore {
    /// Creates an empty store whose ledger defaults to `currency`
    pub fn new(currency: Currency) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                obligations: HashMap::new(),
                revenues: HashMap::new(),
                ledger: Ledger::new(currency),
            }),
        }
    }

    /// Compares an account's balance with its event history
    pub async fn reconcile(&self, account_id: AccountId) -> Result<Reconciliation, PortError> {
        self.state
            .lock()
            .await
            .ledger
            .reconcile(&account_id)
            .map_err(ledger_error)
    }

    /// Every event recorded for an account, oldest first
    pub async fn events_for(&self, account_id: AccountId) -> Vec<LedgerEvent> {
        self.state
            .lock()
            .await
            .ledger
            .events_for(&account_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of events in the log
    pub async fn event_count(&self) -> usize {
        self.state.lock().await.ledger.event_count()
    }

    /// Number of stored obligations, active or not
    pub async fn obligation_count(&self) -> usize {
        self.state.lock().await.obligations.len()
    }
}

fn ledger_error(error: LedgerError) -> PortError {
    match error {
        LedgerError::AccountNotFound(id) => PortError::not_found("Account", id),
        LedgerError::AccountAlreadyExists(id) => {
            PortError::conflict(format!("account {} already exists", id))
        }
        LedgerError::DuplicateEvent { event_source, occurred_on } => PortError::conflict(format!(
            "ledger event for {} on {} already exists",
            event_source, occurred_on
        )),
        LedgerError::AccountInactive(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::CalculationError(_) => PortError::validation(error.to_string()),
    }
}

fn check_version(stored: Option<i64>, expected: i64, entity: &str, id: impl std::fmt::Display) -> Result<(), PortError> {
    match stored {
        None => Err(PortError::not_found(entity, id)),
        Some(version) if version != expected => Err(PortError::conflict(format!(
            "{} {} is at version {}, expected {}",
            entity, id, version, expected
        ))),
        Some(_) => Ok(()),
    }
}

impl DomainPort for InMemorySettlementStore {}

#[async_trait]
impl HealthCheckable for InMemorySettlementStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory-settlement-store", 0)
    }
}

#[async_trait]
impl ObligationStore for InMemorySettlementStore {
    async fn find_active_by_status_and_due_day(
        &self,
        status: ObligationStatus,
        kinds: &[ObligationKind],
        due_day: u32,
    ) -> Result<Vec<Obligation>, PortError> {
        let state = self.state.lock().await;
        let mut found: Vec<_> = state
            .obligations
            .values()
            .filter(|o| {
                o.active
                    && o.status == status
                    && kinds.contains(&o.kind)
                    && o.due_day.get() == due_day
            })
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn find_active(&self, kinds: &[ObligationKind]) -> Result<Vec<Obligation>, PortError> {
        let state = self.state.lock().await;
        let mut found: Vec<_> = state
            .obligations
            .values()
            .filter(|o| o.active && kinds.contains(&o.kind))
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }

    async fn find_by_id(&self, id: ObligationId) -> Result<Option<Obligation>, PortError> {
        Ok(self.state.lock().await.obligations.get(&id).cloned())
    }

    async fn insert(&self, obligation: &Obligation) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        if state.obligations.contains_key(&obligation.id) {
            return Err(PortError::conflict(format!(
                "obligation {} already exists",
                obligation.id
            )));
        }
        state.obligations.insert(obligation.id, obligation.clone());
        Ok(())
    }

    async fn save(&self, obligation: &Obligation) -> Result<Obligation, PortError> {
        let mut state = self.state.lock().await;
        let stored = state.obligations.get(&obligation.id).map(|o| o.version);
        check_version(stored, obligation.version, "Obligation", obligation.id)?;

        let mut next = obligation.clone();
        next.version += 1;
        state.obligations.insert(next.id, next.clone());
        Ok(next)
    }
}

#[async_trait]
impl BalanceLedger for InMemorySettlementStore {
    async fn open_account(&self, account: &Account) -> Result<(), PortError> {
        self.state
            .lock()
            .await
            .ledger
            .open_account(account.clone())
            .map_err(ledger_error)
    }

    async fn adjust(&self, account_id: AccountId, delta: Money) -> Result<Money, PortError> {
        self.state
            .lock()
            .await
            .ledger
            .adjust(&BalanceAdjustment { account_id, delta })
            .map_err(ledger_error)
    }

    async fn balance(&self, account_id: AccountId) -> Result<Option<Money>, PortError> {
        Ok(self.state.lock().await.ledger.balance(&account_id))
    }
}

#[async_trait]
impl LedgerEventStore for InMemorySettlementStore {
    async fn append(&self, event: &LedgerEvent) -> Result<(), PortError> {
        self.state
            .lock()
            .await
            .ledger
            .record(event.clone())
            .map_err(ledger_error)
    }

    async fn exists_for(
        &self,
        source: EventSource,
        occurred_on: NaiveDate,
    ) -> Result<bool, PortError> {
        Ok(self.state.lock().await.ledger.contains(&source, occurred_on))
    }

    async fn find_by_source(&self, source: EventSource) -> Result<Vec<LedgerEvent>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .ledger
            .events_by_source(&source)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RevenueStore for InMemorySettlementStore {
    async fn insert(&self, revenue: &Revenue) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        if state.revenues.contains_key(&revenue.id) {
            return Err(PortError::conflict(format!("revenue {} already exists", revenue.id)));
        }
        state.revenues.insert(revenue.id, revenue.clone());
        Ok(())
    }

    async fn save(&self, revenue: &Revenue) -> Result<Revenue, PortError> {
        let mut state = self.state.lock().await;
        let stored = state.revenues.get(&revenue.id).map(|r| r.version);
        check_version(stored, revenue.version, "Revenue", revenue.id)?;

        let mut next = revenue.clone();
        next.version += 1;
        state.revenues.insert(next.id, next.clone());
        Ok(next)
    }

    async fn find_by_id(&self, id: RevenueId) -> Result<Option<Revenue>, PortError> {
        Ok(self.state.lock().await.revenues.get(&id).cloned())
    }

    async fn find_receivable(&self, today: NaiveDate) -> Result<Vec<Revenue>, PortError> {
        let state = self.state.lock().await;
        let mut found: Vec<_> = state
            .revenues
            .values()
            .filter(|r| r.active && r.status == RevenueStatus::Pending && r.receipt_date <= today)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.receipt_date, r.id));
        Ok(found)
    }
}

#[async_trait]
impl SettlementUnitOfWork for InMemorySettlementStore {
    async fn commit(&self, commit: SettlementCommit) -> Result<CommitOutcome, PortError> {
        let mut state = self.state.lock().await;

        // every check happens before the first write
        if let Some(obligation) = &commit.obligation {
            let stored = state.obligations.get(&obligation.id).map(|o| o.version);
            check_version(stored, obligation.version, "Obligation", obligation.id)?;
        }
        if let Some(revenue) = &commit.revenue {
            let stored = state.revenues.get(&revenue.id).map(|r| r.version);
            check_version(stored, revenue.version, "Revenue", revenue.id)?;
        }
        state.ledger.check_event(&commit.event).map_err(ledger_error)?;
        state
            .ledger
            .check_adjustment(&commit.adjustment)
            .map_err(ledger_error)?;

        let balance = state.ledger.adjust(&commit.adjustment).map_err(ledger_error)?;
        let event_id = commit.event.id;
        state.ledger.record(commit.event).map_err(ledger_error)?;

        if let Some(mut obligation) = commit.obligation {
            obligation.version += 1;
            state.obligations.insert(obligation.id, obligation);
        }
        if let Some(mut revenue) = commit.revenue {
            revenue.version += 1;
            state.revenues.insert(revenue.id, revenue);
        }

        Ok(CommitOutcome { event_id, balance })
    }
}
