//! Settlement engine
//!
//! The engine drives every state change that reaches the ledger:
//!
//! - **Tick**: rolls prior-period settlements back to PENDING, settles the
//!   obligations due today and receives the revenues whose receipt date was
//!   reached
//! - **Manual settlement**: the same transition for one obligation, dated
//!   with the clock's today
//! - **Creation**: opening obligations and registering revenues
//!
//! Each settlement runs under the obligation's keyed lock and re-reads the
//! obligation inside it. Ticks never overlap: a tick that finds the guard
//! taken fails with [`SettlementError::TickInProgress`].

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{
    AccountId, BillingPeriod, Clock, DueDayPolicy, Money, ObligationId, RevenueId,
};
use domain_ledger::{Account, EventSource, LedgerEvent};
use domain_obligation::{
    InstallmentSchedule, NewObligation, NewRevenue, Obligation, ObligationError, ObligationKind,
    ObligationStatus, Opened, Revenue, RevenueKind,
};

use crate::error::SettlementError;
use crate::locks::KeyedLocks;
use crate::ports::{SettlementCommit, SettlementPorts};
use crate::report::{OpenOutcome, PaymentOutcome, ReceiptOutcome, TickIssue, TickReport};

/// Engine settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Handling of due days missing from a month
    pub due_day_policy: DueDayPolicy,
}

/// Applies settlements through the settlement ports
pub struct SettlementEngine {
    ports: SettlementPorts,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    obligation_locks: KeyedLocks<ObligationId>,
    revenue_locks: KeyedLocks<RevenueId>,
    tick_guard: Mutex<()>,
}

impl SettlementEngine {
    pub fn new(ports: SettlementPorts, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            ports,
            clock,
            config,
            obligation_locks: KeyedLocks::new(),
            revenue_locks: KeyedLocks::new(),
            tick_guard: Mutex::new(()),
        }
    }

    /// Today's business date according to the engine's clock
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn policy(&self) -> DueDayPolicy {
        self.config.due_day_policy
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Runs one settlement pass for `today`
    ///
    /// One obligation's failure is recorded in the report and never stops
    /// the others. Only a failure to load the work itself aborts the tick.
    #[instrument(skip(self), fields(%today))]
    pub async fn run_tick(&self, today: NaiveDate) -> Result<TickReport, SettlementError> {
        let _tick = self
            .tick_guard
            .try_lock()
            .map_err(|_| SettlementError::TickInProgress)?;

        let mut report = TickReport::new(today);
        debug!(tick_id = %report.tick_id, "settlement tick started");

        self.roll_over_all(today, &mut report).await?;
        self.settle_due(today, &mut report).await?;
        self.receive_due_revenues(today, &mut report).await?;

        let report = report.finish();
        info!(
            tick_id = %report.tick_id,
            rolled_over = report.rolled_over,
            settled = report.settled.len(),
            revenues_received = report.revenues_received.len(),
            duplicates = report.duplicates.len(),
            defects = report.defects.len(),
            failures = report.failures.len(),
            "settlement tick finished"
        );
        Ok(report)
    }

    async fn roll_over_all(
        &self,
        today: NaiveDate,
        report: &mut TickReport,
    ) -> Result<(), SettlementError> {
        let snapshot = self
            .ports
            .obligations
            .find_active(&ObligationKind::RECURRING)
            .await?;

        for obligation in snapshot.iter().filter(|o| o.needs_rollover(today)) {
            match self.roll_over(obligation.id, today).await {
                Ok(true) => report.rolled_over += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(obligation_id = %obligation.id, error = %e, "rollover failed");
                    report.failures.push(TickIssue {
                        source: EventSource::Obligation(obligation.id),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn roll_over(&self, id: ObligationId, today: NaiveDate) -> Result<bool, SettlementError> {
        let _guard = self.obligation_locks.lock(&id).await;
        let Some(mut obligation) = self.ports.obligations.find_by_id(id).await? else {
            return Ok(false);
        };

        if !obligation.roll_over(today) {
            return Ok(false);
        }
        self.ports.obligations.save(&obligation).await?;
        Ok(true)
    }

    async fn settle_due(
        &self,
        today: NaiveDate,
        report: &mut TickReport,
    ) -> Result<(), SettlementError> {
        for obligation in self.select_due(today).await? {
            let source = EventSource::Obligation(obligation.id);
            match self.apply_payment(obligation.id, today).await {
                Ok(PaymentOutcome::Settled { .. }) => report.settled.push(obligation.id),
                Ok(PaymentOutcome::AlreadySettled | PaymentOutcome::AlreadyCompleted) => {
                    report.duplicates.push(source)
                }
                Err(SettlementError::ValidationDefect { id, reason }) => {
                    warn!(obligation_id = %id, %reason, "skipping malformed obligation");
                    report.defects.push(TickIssue { source, reason });
                }
                Err(e) if e.is_conflict() => {
                    warn!(obligation_id = %obligation.id, error = %e, "obligation settled concurrently");
                    report.duplicates.push(source);
                }
                Err(e) => {
                    error!(obligation_id = %obligation.id, error = %e, "settlement failed");
                    report.failures.push(TickIssue {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn receive_due_revenues(
        &self,
        today: NaiveDate,
        report: &mut TickReport,
    ) -> Result<(), SettlementError> {
        for revenue in self.ports.revenues.find_receivable(today).await? {
            let source = EventSource::Revenue(revenue.id);
            match self.receive_revenue_on(revenue.id, today).await {
                Ok(ReceiptOutcome::Received { .. }) => report.revenues_received.push(revenue.id),
                Ok(ReceiptOutcome::AlreadyReceived) => report.duplicates.push(source),
                Err(e) if e.is_conflict() => report.duplicates.push(source),
                Err(e) => {
                    error!(revenue_id = %revenue.id, error = %e, "revenue receipt failed");
                    report.failures.push(TickIssue {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Active PENDING recurring obligations due on `today`
    ///
    /// On the last day of a month, under `ClampToMonthEnd`, obligations
    /// anchored on days the month lacks are due as well.
    pub async fn select_due(&self, today: NaiveDate) -> Result<Vec<Obligation>, SettlementError> {
        let policy = self.policy();
        let last_day = BillingPeriod::containing(today).days_in_month();
        let days = match policy {
            DueDayPolicy::ClampToMonthEnd if today.day() == last_day => today.day()..=31,
            _ => today.day()..=today.day(),
        };

        let mut due = Vec::new();
        for day in days {
            let found = self
                .ports
                .obligations
                .find_active_by_status_and_due_day(
                    ObligationStatus::Pending,
                    &ObligationKind::RECURRING,
                    day,
                )
                .await?;
            due.extend(found.into_iter().filter(|o| o.is_due_on(today, policy)));
        }

        due.sort_by_key(|o| o.id);
        due.dedup_by_key(|o| o.id);
        Ok(due)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Settles the next installment of an obligation on `date`
    ///
    /// Repeating the call for the same date is a no-op reported as
    /// [`PaymentOutcome::AlreadySettled`].
    #[instrument(skip(self), fields(obligation_id = %id, %date))]
    pub async fn apply_payment(
        &self,
        id: ObligationId,
        date: NaiveDate,
    ) -> Result<PaymentOutcome, SettlementError> {
        let _guard = self.obligation_locks.lock(&id).await;
        let obligation = self.load_obligation(id).await?;
        let source = EventSource::Obligation(id);

        if !obligation.active || obligation.is_completed() {
            debug!("obligation is completed or inactive");
            return Ok(PaymentOutcome::AlreadyCompleted);
        }
        if obligation.settled_in_period_of(date) || self.ports.events.exists_for(source, date).await? {
            debug!("obligation already settled for this period");
            return Ok(PaymentOutcome::AlreadySettled);
        }

        let settlement = match obligation.settle(date, self.policy()) {
            Ok(settlement) => settlement,
            Err(ObligationError::AlreadyCompleted(_)) => return Ok(PaymentOutcome::AlreadyCompleted),
            Err(ObligationError::AlreadySettled { .. }) => return Ok(PaymentOutcome::AlreadySettled),
            Err(e) => return Err(e.into()),
        };

        let installment_number = settlement.obligation.current_installment;
        let status = settlement.event.status;
        let completed = settlement.completes();
        let amount = settlement.event.amount;

        let commit = SettlementCommit::for_obligation(settlement);
        let account_id = commit.account_id();
        let outcome = match self.ports.unit_of_work.commit(commit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let e = SettlementError::from_commit(e, account_id);
                if e.is_conflict() && self.ports.events.exists_for(source, date).await? {
                    return Ok(PaymentOutcome::AlreadySettled);
                }
                return Err(e);
            }
        };

        info!(
            event_id = %outcome.event_id,
            installment = installment_number,
            total_installments = obligation.total_installments,
            %amount,
            status = status.as_str(),
            completed,
            "obligation settled"
        );

        Ok(PaymentOutcome::Settled {
            event_id: outcome.event_id,
            installment_number,
            status,
            completed,
            balance: outcome.balance,
        })
    }

    /// Settles an obligation now, dated with the clock's today
    pub async fn settle_manually(&self, id: ObligationId) -> Result<PaymentOutcome, SettlementError> {
        self.apply_payment(id, self.today()).await
    }

    // ------------------------------------------------------------------
    // Obligations
    // ------------------------------------------------------------------

    /// Opens an obligation
    ///
    /// Recurring obligations are stored as PENDING. A single obligation is
    /// settled on its opening date and leaves no obligation behind.
    #[instrument(skip(self, request), fields(account_id = %request.account_id, kind = request.kind.as_str()))]
    pub async fn open_obligation(
        &self,
        request: NewObligation,
    ) -> Result<OpenOutcome, SettlementError> {
        match request.open(self.policy())? {
            Opened::Recurring(obligation) => {
                self.ports.obligations.insert(&obligation).await?;
                info!(obligation_id = %obligation.id, "obligation scheduled");
                Ok(OpenOutcome::Scheduled(obligation))
            }
            Opened::Settled(settlement) => {
                let event = settlement.event.clone();
                let commit = SettlementCommit::detached(settlement);
                let account_id = commit.account_id();
                let outcome = self
                    .ports
                    .unit_of_work
                    .commit(commit)
                    .await
                    .map_err(|e| SettlementError::from_commit(e, account_id))?;
                info!(event_id = %outcome.event_id, "single obligation settled");
                Ok(OpenOutcome::Settled {
                    event,
                    balance: outcome.balance,
                })
            }
        }
    }

    /// Deactivates an obligation; it is never selected again
    #[instrument(skip(self), fields(obligation_id = %id))]
    pub async fn cancel_obligation(&self, id: ObligationId) -> Result<Obligation, SettlementError> {
        let _guard = self.obligation_locks.lock(&id).await;
        let mut obligation = self.load_obligation(id).await?;
        obligation.cancel()?;
        Ok(self.ports.obligations.save(&obligation).await?)
    }

    pub async fn obligation(&self, id: ObligationId) -> Result<Obligation, SettlementError> {
        self.load_obligation(id).await
    }

    /// Projected installments of an obligation
    pub async fn installment_schedule(
        &self,
        id: ObligationId,
    ) -> Result<InstallmentSchedule, SettlementError> {
        let obligation = self.load_obligation(id).await?;
        Ok(InstallmentSchedule::for_obligation(&obligation, self.policy())?)
    }

    async fn load_obligation(&self, id: ObligationId) -> Result<Obligation, SettlementError> {
        self.ports
            .obligations
            .find_by_id(id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("Obligation {}", id)))
    }

    // ------------------------------------------------------------------
    // Revenues
    // ------------------------------------------------------------------

    /// Registers a revenue, receiving it at once when it is already due
    #[instrument(skip(self, request), fields(account_id = %request.account_id, kind = request.kind.as_str()))]
    pub async fn register_revenue(&self, request: NewRevenue) -> Result<Revenue, SettlementError> {
        let revenue = request.register(self.policy())?;
        // Nothing is stored for an account that cannot be credited
        self.balance(revenue.account_id).await?;
        self.ports.revenues.insert(&revenue).await?;

        let receive_on = match revenue.kind {
            RevenueKind::OneOff => revenue.receipt_date,
            RevenueKind::Fixed => self.today(),
        };
        if !revenue.is_receivable_on(receive_on) {
            info!(revenue_id = %revenue.id, receipt_date = %revenue.receipt_date, "revenue pending");
            return Ok(revenue);
        }

        self.receive_revenue_on(revenue.id, receive_on).await?;
        self.load_revenue(revenue.id).await
    }

    /// Receives a revenue now, if its receipt date was reached
    pub async fn receive_revenue(&self, id: RevenueId) -> Result<ReceiptOutcome, SettlementError> {
        self.receive_revenue_on(id, self.today()).await
    }

    #[instrument(skip(self), fields(revenue_id = %id, %today))]
    async fn receive_revenue_on(
        &self,
        id: RevenueId,
        today: NaiveDate,
    ) -> Result<ReceiptOutcome, SettlementError> {
        let _guard = self.revenue_locks.lock(&id).await;
        let revenue = self.load_revenue(id).await?;
        let source = EventSource::Revenue(id);

        if revenue.is_received()
            || self.ports.events.exists_for(source, revenue.receipt_date).await?
        {
            return Ok(ReceiptOutcome::AlreadyReceived);
        }

        let receipt = match revenue.receive(today) {
            Ok(receipt) => receipt,
            Err(ObligationError::AlreadyReceived(_)) => return Ok(ReceiptOutcome::AlreadyReceived),
            Err(e) => return Err(e.into()),
        };

        let amount = receipt.event.amount;
        let commit = SettlementCommit::for_receipt(receipt);
        let account_id = commit.account_id();
        let outcome = self
            .ports
            .unit_of_work
            .commit(commit)
            .await
            .map_err(|e| SettlementError::from_commit(e, account_id))?;

        info!(event_id = %outcome.event_id, %amount, "revenue received");
        Ok(ReceiptOutcome::Received {
            event_id: outcome.event_id,
            balance: outcome.balance,
        })
    }

    pub async fn revenue(&self, id: RevenueId) -> Result<Revenue, SettlementError> {
        self.load_revenue(id).await
    }

    async fn load_revenue(&self, id: RevenueId) -> Result<Revenue, SettlementError> {
        self.ports
            .revenues
            .find_by_id(id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("Revenue {}", id)))
    }

    // ------------------------------------------------------------------
    // Accounts and ledger
    // ------------------------------------------------------------------

    pub async fn open_account(&self, account: Account) -> Result<(), SettlementError> {
        self.ports.balances.open_account(&account).await?;
        info!(account_id = %account.id, "account opened");
        Ok(())
    }

    /// Current balance of an account
    pub async fn balance(&self, account_id: AccountId) -> Result<Money, SettlementError> {
        self.ports
            .balances
            .balance(account_id)
            .await?
            .ok_or(SettlementError::MissingAccount(account_id))
    }

    /// Ledger events produced by an obligation or revenue
    pub async fn ledger_events(
        &self,
        source: EventSource,
    ) -> Result<Vec<LedgerEvent>, SettlementError> {
        Ok(self.ports.events.find_by_source(source).await?)
    }
}
