//! PostgreSQL Settlement Adapter
//!
//! Implements every settlement port over the repositories. The unit of work
//! runs the obligation/revenue update, the balance adjustment and the event
//! insert in one transaction; dropping the transaction on any error rolls
//! all of them back.
//!
//! # Error Handling
//!
//! Database errors become `PortError`s through `From<DatabaseError>`; a
//! missing account surfaces as `PortError::NotFound` for entity `Account`,
//! a stale version or duplicate event as `PortError::Conflict`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AccountId, DomainPort, HealthCheckResult, HealthCheckable, Money,
    ObligationId, PortError, RevenueId,
};
use domain_ledger::{Account, EventSource, LedgerEvent};
use domain_obligation::{Obligation, ObligationKind, ObligationStatus, Revenue};
use domain_settlement::{
    BalanceLedger, CommitOutcome, LedgerEventStore, ObligationStore, RevenueStore,
    SettlementCommit, SettlementUnitOfWork,
};

use crate::error::DatabaseError;
use crate::repositories::{LedgerRepository, ObligationRepository, RevenueRepository};

const ADAPTER_ID: &str = "postgres-settlement-store";

/// PostgreSQL-backed settlement store
#[derive(Debug, Clone)]
pub struct PgSettlementStore {
    pool: PgPool,
    obligations: ObligationRepository,
    ledger: LedgerRepository,
    revenues: RevenueRepository,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            obligations: ObligationRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            revenues: RevenueRepository::new(pool.clone()),
            pool,
        }
    }

    /// The ledger repository, for queries the ports do not expose
    pub fn ledger(&self) -> &LedgerRepository {
        &self.ledger
    }

    async fn commit_in_transaction(
        &self,
        commit: SettlementCommit,
    ) -> Result<CommitOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        if let Some(obligation) = &commit.obligation {
            ObligationRepository::save_in(&mut tx, obligation).await?;
        }
        if let Some(revenue) = &commit.revenue {
            RevenueRepository::save_in(&mut tx, revenue).await?;
        }

        let balance =
            LedgerRepository::adjust_in(&mut tx, commit.adjustment.account_id, commit.adjustment.delta)
                .await?;
        LedgerRepository::append_in(&mut tx, &commit.event).await?;

        tx.commit().await?;

        Ok(CommitOutcome {
            event_id: commit.event.id,
            balance,
        })
    }
}

impl DomainPort for PgSettlementStore {}

#[async_trait]
impl HealthCheckable for PgSettlementStore {
    /// Round-trips `SELECT 1` through the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl ObligationStore for PgSettlementStore {
    #[instrument(skip_all, fields(status = status.as_str(), due_day = due_day))]
    async fn find_active_by_status_and_due_day(
        &self,
        status: ObligationStatus,
        kinds: &[ObligationKind],
        due_day: u32,
    ) -> Result<Vec<Obligation>, PortError> {
        let found = self
            .obligations
            .find_active_by_status_and_due_day(status, kinds, due_day)
            .await?;
        debug!(count = found.len(), "obligations selected");
        Ok(found)
    }

    async fn find_active(&self, kinds: &[ObligationKind]) -> Result<Vec<Obligation>, PortError> {
        Ok(self.obligations.find_active(kinds).await?)
    }

    #[instrument(skip_all, fields(obligation_id = %id))]
    async fn find_by_id(&self, id: ObligationId) -> Result<Option<Obligation>, PortError> {
        Ok(self.obligations.find_by_id(id).await?)
    }

    #[instrument(skip(self, obligation), fields(obligation_id = %obligation.id))]
    async fn insert(&self, obligation: &Obligation) -> Result<(), PortError> {
        Ok(self.obligations.insert(obligation).await?)
    }

    #[instrument(skip(self, obligation), fields(obligation_id = %obligation.id, version = obligation.version))]
    async fn save(&self, obligation: &Obligation) -> Result<Obligation, PortError> {
        Ok(self.obligations.save(obligation).await?)
    }
}

#[async_trait]
impl BalanceLedger for PgSettlementStore {
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn open_account(&self, account: &Account) -> Result<(), PortError> {
        Ok(self.ledger.open_account(account).await?)
    }

    #[instrument(skip_all, fields(account_id = %account_id, delta = %delta))]
    async fn adjust(&self, account_id: AccountId, delta: Money) -> Result<Money, PortError> {
        Ok(self.ledger.adjust(account_id, delta).await?)
    }

    async fn balance(&self, account_id: AccountId) -> Result<Option<Money>, PortError> {
        Ok(self.ledger.balance(account_id).await?)
    }
}

#[async_trait]
impl LedgerEventStore for PgSettlementStore {
    #[instrument(skip(self, event), fields(event_id = %event.id, source = %event.source))]
    async fn append(&self, event: &LedgerEvent) -> Result<(), PortError> {
        Ok(self.ledger.append(event).await?)
    }

    async fn exists_for(
        &self,
        source: EventSource,
        occurred_on: NaiveDate,
    ) -> Result<bool, PortError> {
        Ok(self.ledger.exists_for(source, occurred_on).await?)
    }

    async fn find_by_source(&self, source: EventSource) -> Result<Vec<LedgerEvent>, PortError> {
        Ok(self.ledger.find_by_source(source).await?)
    }
}

#[async_trait]
impl RevenueStore for PgSettlementStore {
    #[instrument(skip(self, revenue), fields(revenue_id = %revenue.id))]
    async fn insert(&self, revenue: &Revenue) -> Result<(), PortError> {
        Ok(self.revenues.insert(revenue).await?)
    }

    #[instrument(skip(self, revenue), fields(revenue_id = %revenue.id, version = revenue.version))]
    async fn save(&self, revenue: &Revenue) -> Result<Revenue, PortError> {
        Ok(self.revenues.save(revenue).await?)
    }

    async fn find_by_id(&self, id: RevenueId) -> Result<Option<Revenue>, PortError> {
        Ok(self.revenues.find_by_id(id).await?)
    }

    async fn find_receivable(&self, today: NaiveDate) -> Result<Vec<Revenue>, PortError> {
        Ok(self.revenues.find_receivable(today).await?)
    }
}

#[async_trait]
impl SettlementUnitOfWork for PgSettlementStore {
    #[instrument(skip(self, commit), fields(event_id = %commit.event.id, account_id = %commit.account_id()))]
    async fn commit(&self, commit: SettlementCommit) -> Result<CommitOutcome, PortError> {
        let outcome = self.commit_in_transaction(commit).await?;
        debug!(balance = %outcome.balance, "settlement committed");
        Ok(outcome)
    }
}
