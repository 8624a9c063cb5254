//! Tests for the settlement engine

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

use core_kernel::{
    AccountId, Clock, DomainPort, DueDayPolicy, FixedClock, ObligationId, PortError,
};
use domain_ledger::{EventSource, EventStatus, Flow};
use domain_obligation::{
    NewObligation, Obligation, ObligationError, ObligationKind, ObligationStatus, RevenueStatus,
};
use domain_settlement::{
    EngineConfig, InMemorySettlementStore, ObligationStore, OpenOutcome, PaymentOutcome,
    ReceiptOutcome, SettlementEngine, SettlementError, SettlementPorts, TickScheduler,
};
use test_utils::{
    assert_installment_sequence, assert_money_eq, assert_money_zero, assert_no_duplicate_events,
    assert_obligation_state, AccountFixtures, DateFixtures, DueDayFixtures, MoneyFixtures,
    TestObligationBuilder, TestRevenueBuilder,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    DateFixtures::date(y, m, d)
}

struct Harness {
    store: Arc<InMemorySettlementStore>,
    clock: Arc<FixedClock>,
    engine: Arc<SettlementEngine>,
    account: AccountId,
}

async fn harness_with(today: NaiveDate, policy: DueDayPolicy) -> Harness {
    let store = Arc::new(InMemorySettlementStore::default());
    let clock = Arc::new(FixedClock::new(today));
    let engine = SettlementEngine::new(
        SettlementPorts::from_store(store.clone()),
        clock.clone(),
        EngineConfig {
            due_day_policy: policy,
        },
    );
    engine.open_account(AccountFixtures::checking()).await.unwrap();

    Harness {
        store,
        clock,
        engine: Arc::new(engine),
        account: AccountFixtures::checking_id(),
    }
}

async fn harness(today: NaiveDate) -> Harness {
    harness_with(today, DueDayPolicy::ClampToMonthEnd).await
}

impl Harness {
    async fn open(&self, builder: TestObligationBuilder) -> Obligation {
        match self.engine.open_obligation(builder.request()).await.unwrap() {
            OpenOutcome::Scheduled(obligation) => obligation,
            OpenOutcome::Settled { .. } => panic!("expected a recurring obligation"),
        }
    }

    async fn reload(&self, id: ObligationId) -> Obligation {
        self.engine.obligation(id).await.unwrap()
    }

    async fn tick(&self, today: NaiveDate) -> domain_settlement::TickReport {
        self.clock.set(today);
        self.engine.run_tick(today).await.unwrap()
    }
}

// ============================================================================
// Installment Plan Tests
// ============================================================================

mod installment_tests {
    use super::*;

    #[tokio::test]
    async fn test_three_installments_settle_over_three_months() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let report = h.tick(date(2025, 1, 5)).await;
        assert_eq!(report.settled, vec![laptop.id]);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-333.33));
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Settled, 1);

        let report = h.tick(date(2025, 2, 5)).await;
        assert_eq!(report.rolled_over, 1);
        assert_eq!(report.settled, vec![laptop.id]);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-666.66));

        let report = h.tick(date(2025, 3, 5)).await;
        assert_eq!(report.settled, vec![laptop.id]);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-1000.00));
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Completed, 3);

        let events = h
            .engine
            .ledger_events(EventSource::Obligation(laptop.id))
            .await
            .unwrap();
        let amounts: Vec<_> = events.iter().map(|e| e.amount.amount()).collect();
        assert_eq!(amounts, vec![dec!(333.33), dec!(333.33), dec!(333.34)]);
        assert_installment_sequence(&events, laptop.id);
        assert_eq!(events[2].description, "Laptop (3/3)");
        assert!(events.iter().all(|e| e.status == EventStatus::Settled));
    }

    #[tokio::test]
    async fn test_completed_obligation_is_never_selected_again() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new().with_installments(1)).await;

        h.tick(date(2025, 1, 5)).await;
        let report = h.tick(date(2025, 2, 5)).await;

        assert_eq!(report.rolled_over, 0);
        assert!(report.settled.is_empty());
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Completed, 1);
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_rollover_happens_on_first_tick_of_new_month() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        h.tick(date(2025, 1, 5)).await;
        let report = h.tick(date(2025, 1, 20)).await;
        assert_eq!(report.rolled_over, 0);

        let report = h.tick(date(2025, 2, 1)).await;
        assert_eq!(report.rolled_over, 1);
        assert!(report.settled.is_empty());
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Pending, 1);
    }

    #[tokio::test]
    async fn test_fixed_recurring_settles_per_period_amount() {
        let h = harness(DateFixtures::opened_on()).await;
        let rent = h.open(TestObligationBuilder::rent(12)).await;

        h.tick(date(2025, 1, 5)).await;
        h.tick(date(2025, 2, 5)).await;

        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-3000.00));
        assert_obligation_state(&h.reload(rent.id).await, ObligationStatus::Settled, 2);
    }

    #[tokio::test]
    async fn test_inflow_obligation_credits_balance() {
        let h = harness(DateFixtures::opened_on()).await;
        h.open(TestObligationBuilder::new().with_flow(Flow::Inflow)).await;

        h.tick(date(2025, 1, 5)).await;
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(333.33));
    }

    #[tokio::test]
    async fn test_obligations_not_due_are_untouched() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let report = h.tick(date(2025, 1, 4)).await;
        assert!(report.settled.is_empty());
        assert_eq!(h.reload(laptop.id).await.version, laptop.version);
        assert_money_zero(&h.engine.balance(h.account).await.unwrap());
    }

    #[tokio::test]
    async fn test_balance_reconciles_with_events() {
        let h = harness(DateFixtures::opened_on()).await;
        h.open(TestObligationBuilder::new()).await;
        h.open(TestObligationBuilder::rent(6).with_due_day(DueDayFixtures::day(10))).await;

        for day in [date(2025, 1, 5), date(2025, 1, 10), date(2025, 2, 5), date(2025, 2, 10)] {
            h.tick(day).await;
        }

        let reconciliation = h.store.reconcile(h.account).await.unwrap();
        assert!(reconciliation.is_consistent);
        assert_money_eq(&reconciliation.balance, dec!(-3666.66));
        assert_no_duplicate_events(&h.store.events_for(h.account).await);
    }
}

// ============================================================================
// Manual Settlement Tests
// ============================================================================

mod manual_settlement_tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_settle_twice_same_day_is_noop() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;
        h.clock.set(date(2025, 1, 10));

        let first = h.engine.settle_manually(laptop.id).await.unwrap();
        let second = h.engine.settle_manually(laptop.id).await.unwrap();

        match first {
            PaymentOutcome::Settled {
                installment_number,
                status,
                completed,
                balance,
                ..
            } => {
                assert_eq!(installment_number, 1);
                assert_eq!(status, EventStatus::Late);
                assert!(!completed);
                assert_money_eq(&balance, dec!(-333.33));
            }
            other => panic!("expected a settlement, got {:?}", other),
        }
        assert_eq!(second, PaymentOutcome::AlreadySettled);
        assert_eq!(h.store.event_count().await, 1);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-333.33));
    }

    #[tokio::test]
    async fn test_manual_settle_before_due_day_is_on_time() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let outcome = h.engine.settle_manually(laptop.id).await.unwrap();
        assert!(matches!(
            outcome,
            PaymentOutcome::Settled {
                status: EventStatus::Settled,
                ..
            }
        ));

        // the tick on the due day finds the period already settled
        let report = h.tick(date(2025, 1, 5)).await;
        assert!(report.settled.is_empty());
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_apply_payment_is_idempotent_per_date() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;
        let day = date(2025, 1, 5);

        assert!(h.engine.apply_payment(laptop.id, day).await.unwrap().is_settled());
        assert_eq!(
            h.engine.apply_payment(laptop.id, day).await.unwrap(),
            PaymentOutcome::AlreadySettled
        );
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_completed_obligation_is_terminal() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new().with_installments(1)).await;
        h.engine.apply_payment(laptop.id, date(2025, 1, 5)).await.unwrap();

        let before = h.reload(laptop.id).await;
        let outcome = h.engine.apply_payment(laptop.id, date(2025, 2, 5)).await.unwrap();

        assert_eq!(outcome, PaymentOutcome::AlreadyCompleted);
        assert_eq!(h.reload(laptop.id).await, before);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-1000.00));
    }

    #[tokio::test]
    async fn test_unknown_obligation_is_not_found() {
        let h = harness(DateFixtures::opened_on()).await;
        let result = h.engine.settle_manually(ObligationId::new()).await;
        assert!(matches!(result, Err(SettlementError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_manual_and_tick_race_settles_once() {
        let h = harness(date(2025, 1, 5)).await;
        let laptop = h.open(TestObligationBuilder::new()).await;
        let day = date(2025, 1, 5);

        let manual = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.settle_manually(laptop.id).await })
        };
        let tick = {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.run_tick(day).await })
        };

        let manual = manual.await.unwrap().unwrap();
        let report = tick.await.unwrap().unwrap();

        let settled_by_tick = report.settled.contains(&laptop.id);
        assert_ne!(manual.is_settled(), settled_by_tick);
        assert_eq!(h.store.event_count().await, 1);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(-333.33));
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Settled, 1);
    }

    #[tokio::test]
    async fn test_cancelled_obligation_is_skipped() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let cancelled = h.engine.cancel_obligation(laptop.id).await.unwrap();
        assert!(!cancelled.active);

        let report = h.tick(date(2025, 1, 5)).await;
        assert!(report.settled.is_empty());
        assert_eq!(
            h.engine.settle_manually(laptop.id).await.unwrap(),
            PaymentOutcome::AlreadyCompleted
        );
        assert_money_zero(&h.engine.balance(h.account).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_completed_obligation_fails() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new().with_installments(1)).await;
        h.engine.apply_payment(laptop.id, date(2025, 1, 5)).await.unwrap();

        let result = h.engine.cancel_obligation(laptop.id).await;
        assert!(matches!(
            result,
            Err(SettlementError::Obligation(ObligationError::InvalidStatusTransition { .. }))
        ));
    }
}

// ============================================================================
// Single Obligation Tests
// ============================================================================

mod single_obligation_tests {
    use super::*;

    #[tokio::test]
    async fn test_single_obligation_settles_immediately() {
        let h = harness(DateFixtures::opened_on()).await;
        let request = NewObligation::single(
            h.account,
            "Coffee beans",
            MoneyFixtures::brl_50(),
            DateFixtures::opened_on(),
        );

        let outcome = h.engine.open_obligation(request).await.unwrap();
        let OpenOutcome::Settled { event, balance } = outcome else {
            panic!("single obligations settle on open");
        };

        assert_money_eq(&balance, dec!(-50.00));
        assert_eq!(event.occurred_on, DateFixtures::opened_on());
        assert_eq!(event.description, "Coffee beans");
        assert_eq!(h.store.obligation_count().await, 0);
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_single_obligation_for_unknown_account_fails() {
        let h = harness(DateFixtures::opened_on()).await;
        let stranger = AccountId::new();
        let request = NewObligation::single(
            stranger,
            "Coffee beans",
            MoneyFixtures::brl_50(),
            DateFixtures::opened_on(),
        );

        let result = h.engine.open_obligation(request).await;
        assert!(matches!(result, Err(SettlementError::MissingAccount(id)) if id == stranger));
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_amount_is_rejected() {
        let h = harness(DateFixtures::opened_on()).await;
        let result = h
            .engine
            .open_obligation(
                TestObligationBuilder::new()
                    .with_amount(MoneyFixtures::brl_zero())
                    .request(),
            )
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::Obligation(ObligationError::InvalidAmount(_)))
        ));
        assert_eq!(h.store.obligation_count().await, 0);
    }
}

// ============================================================================
// Due Day Policy Tests
// ============================================================================

mod due_day_tests {
    use super::*;

    #[tokio::test]
    async fn test_clamp_settles_day_31_on_april_30() {
        let h = harness(date(2025, 4, 1)).await;
        let rent = h
            .open(
                TestObligationBuilder::rent(3)
                    .with_due_day(DueDayFixtures::thirty_first())
                    .with_opened_on(date(2025, 4, 1)),
            )
            .await;

        assert!(h.tick(date(2025, 4, 29)).await.settled.is_empty());
        let report = h.tick(DateFixtures::april_30()).await;
        assert_eq!(report.settled, vec![rent.id]);

        let events = h.engine.ledger_events(EventSource::Obligation(rent.id)).await.unwrap();
        assert_eq!(events[0].status, EventStatus::Settled);
    }

    #[tokio::test]
    async fn test_clamp_selects_every_missing_day_at_month_end() {
        let h = harness(date(2025, 2, 1)).await;
        let mut ids = Vec::new();
        for day in [28, 29, 30, 31] {
            let obligation = h
                .open(
                    TestObligationBuilder::new()
                        .with_due_day(DueDayFixtures::day(day))
                        .with_opened_on(date(2025, 2, 1)),
                )
                .await;
            ids.push(obligation.id);
        }
        ids.sort();

        let due = h.engine.select_due(DateFixtures::february_28()).await.unwrap();
        let due_ids: Vec<_> = due.iter().map(|o| o.id).collect();
        assert_eq!(due_ids, ids);
    }

    #[tokio::test]
    async fn test_skip_leaves_missing_day_for_next_month() {
        let h = harness_with(date(2025, 4, 1), DueDayPolicy::Skip).await;
        let rent = h
            .open(
                TestObligationBuilder::rent(3)
                    .with_due_day(DueDayFixtures::thirty_first())
                    .with_opened_on(date(2025, 4, 1)),
            )
            .await;

        assert!(h.tick(DateFixtures::april_30()).await.settled.is_empty());
        assert!(h.tick(date(2025, 5, 30)).await.settled.is_empty());
        assert_eq!(h.tick(date(2025, 5, 31)).await.settled, vec![rent.id]);
    }

    #[tokio::test]
    async fn test_schedule_projects_due_dates() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;
        h.tick(date(2025, 1, 5)).await;

        let schedule = h.engine.installment_schedule(laptop.id).await.unwrap();
        let due_dates: Vec<_> = schedule.all().iter().map(|i| i.due_date).collect();
        assert_eq!(due_dates, vec![date(2025, 1, 5), date(2025, 2, 5), date(2025, 3, 5)]);
        assert_eq!(schedule.pending().len(), 2);
    }
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_account_leaves_obligation_unchanged_and_retries() {
        let h = harness(DateFixtures::opened_on()).await;
        let orphan = AccountFixtures::fresh("Credit card");
        let laptop = h
            .open(TestObligationBuilder::new().with_account(orphan.id))
            .await;

        let report = h.tick(date(2025, 1, 5)).await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, EventSource::Obligation(laptop.id));
        assert_eq!(h.reload(laptop.id).await, laptop);
        assert_eq!(h.store.event_count().await, 0);

        h.engine.open_account(orphan.clone()).await.unwrap();
        let report = h.tick(date(2025, 1, 5)).await;
        assert_eq!(report.settled, vec![laptop.id]);
        assert_money_eq(&h.engine.balance(orphan.id).await.unwrap(), dec!(-333.33));
    }

    #[tokio::test]
    async fn test_malformed_obligation_is_skipped_as_defect() {
        let h = harness(DateFixtures::opened_on()).await;
        let broken = TestObligationBuilder::new()
            .with_installment_amount(None)
            .build();
        ObligationStore::insert(h.store.as_ref(), &broken).await.unwrap();
        let healthy = h.open(TestObligationBuilder::rent(2)).await;

        let report = h.tick(date(2025, 1, 5)).await;

        assert_eq!(report.defects.len(), 1);
        assert_eq!(report.defects[0].source, EventSource::Obligation(broken.id));
        assert_eq!(report.settled, vec![healthy.id]);
        assert!(report.failures.is_empty());
        assert_eq!(h.reload(broken.id).await, broken);
    }

    #[tokio::test]
    async fn test_balance_of_unknown_account() {
        let h = harness(DateFixtures::opened_on()).await;
        let stranger = AccountId::new();
        assert!(matches!(
            h.engine.balance(stranger).await,
            Err(SettlementError::MissingAccount(id)) if id == stranger
        ));
    }
}

// ============================================================================
// Revenue Tests
// ============================================================================

mod revenue_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_off_revenue_is_received_on_registration() {
        let h = harness(DateFixtures::opened_on()).await;
        let revenue = h
            .engine
            .register_revenue(TestRevenueBuilder::new().request())
            .await
            .unwrap();

        assert_eq!(revenue.status, RevenueStatus::Received);
        assert_eq!(revenue.received_on, Some(DateFixtures::opened_on()));
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(4200.00));

        let events = h.engine.ledger_events(EventSource::Revenue(revenue.id)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].flow, Flow::Inflow);
    }

    #[tokio::test]
    async fn test_fixed_revenue_waits_for_receipt_date() {
        let h = harness(DateFixtures::opened_on()).await;
        let receipt_date = date(2025, 2, 10);
        let revenue = h
            .engine
            .register_revenue(TestRevenueBuilder::fixed_on(receipt_date).request())
            .await
            .unwrap();

        assert_eq!(revenue.status, RevenueStatus::Pending);
        assert_money_zero(&h.engine.balance(h.account).await.unwrap());

        let report = h.tick(date(2025, 2, 9)).await;
        assert!(report.revenues_received.is_empty());
        assert_money_zero(&h.engine.balance(h.account).await.unwrap());

        let report = h.tick(receipt_date).await;
        assert_eq!(report.revenues_received, vec![revenue.id]);
        assert_money_eq(&h.engine.balance(h.account).await.unwrap(), dec!(4200.00));
        assert_eq!(h.engine.revenue(revenue.id).await.unwrap().status, RevenueStatus::Received);

        let report = h.tick(date(2025, 2, 11)).await;
        assert!(report.revenues_received.is_empty());
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_fixed_revenue_with_reached_date_is_received_at_registration() {
        let h = harness(date(2025, 2, 15)).await;
        let revenue = h
            .engine
            .register_revenue(
                TestRevenueBuilder::fixed_on(date(2025, 2, 10))
                    .with_registered_on(date(2025, 2, 15))
                    .request(),
            )
            .await
            .unwrap();

        assert_eq!(revenue.status, RevenueStatus::Received);
        assert_eq!(revenue.received_on, Some(date(2025, 2, 10)));
    }

    #[tokio::test]
    async fn test_revenue_for_unknown_account_leaves_nothing_behind() {
        let h = harness(DateFixtures::opened_on()).await;
        let payroll = AccountFixtures::fresh("Payroll");

        let result = h
            .engine
            .register_revenue(TestRevenueBuilder::new().with_account(payroll.id).request())
            .await;
        assert!(matches!(result, Err(SettlementError::MissingAccount(id)) if id == payroll.id));

        h.engine.open_account(payroll.clone()).await.unwrap();
        let report = h.tick(DateFixtures::opened_on()).await;
        assert!(report.revenues_received.is_empty());
        assert_money_zero(&h.engine.balance(payroll.id).await.unwrap());
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_manual_receipt_before_date_fails() {
        let h = harness(DateFixtures::opened_on()).await;
        let revenue = h
            .engine
            .register_revenue(TestRevenueBuilder::fixed_on(date(2025, 2, 10)).request())
            .await
            .unwrap();

        let result = h.engine.receive_revenue(revenue.id).await;
        assert!(matches!(
            result,
            Err(SettlementError::Obligation(ObligationError::NotYetReceivable { .. }))
        ));

        h.clock.set(date(2025, 2, 10));
        assert!(matches!(
            h.engine.receive_revenue(revenue.id).await.unwrap(),
            ReceiptOutcome::Received { .. }
        ));
        assert_eq!(
            h.engine.receive_revenue(revenue.id).await.unwrap(),
            ReceiptOutcome::AlreadyReceived
        );
    }
}

// ============================================================================
// Tick Serialization Tests
// ============================================================================

mod tick_guard_tests {
    use super::*;

    /// Obligation store whose snapshot read blocks until released
    struct GatedObligations {
        inner: Arc<InMemorySettlementStore>,
        entered: Notify,
        release: Notify,
    }

    impl DomainPort for GatedObligations {}

    #[async_trait]
    impl ObligationStore for GatedObligations {
        async fn find_active_by_status_and_due_day(
            &self,
            status: ObligationStatus,
            kinds: &[ObligationKind],
            due_day: u32,
        ) -> Result<Vec<Obligation>, PortError> {
            self.inner
                .find_active_by_status_and_due_day(status, kinds, due_day)
                .await
        }

        async fn find_active(&self, kinds: &[ObligationKind]) -> Result<Vec<Obligation>, PortError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.find_active(kinds).await
        }

        async fn find_by_id(&self, id: ObligationId) -> Result<Option<Obligation>, PortError> {
            ObligationStore::find_by_id(self.inner.as_ref(), id).await
        }

        async fn insert(&self, obligation: &Obligation) -> Result<(), PortError> {
            ObligationStore::insert(self.inner.as_ref(), obligation).await
        }

        async fn save(&self, obligation: &Obligation) -> Result<Obligation, PortError> {
            ObligationStore::save(self.inner.as_ref(), obligation).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_rejected() {
        let store = Arc::new(InMemorySettlementStore::default());
        let gate = Arc::new(GatedObligations {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let mut ports = SettlementPorts::from_store(store.clone());
        ports.obligations = gate.clone() as Arc<dyn ObligationStore>;

        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(DateFixtures::first_due()));
        let engine = Arc::new(SettlementEngine::new(ports, clock, EngineConfig::default()));
        let day = DateFixtures::first_due();

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_tick(day).await })
        };
        gate.entered.notified().await;

        let second = engine.run_tick(day).await;
        assert!(matches!(second, Err(SettlementError::TickInProgress)));

        gate.release.notify_one();
        let report = first.await.unwrap().unwrap();
        assert!(report.is_clean());
        assert!(report.finished_at.is_some());
    }
}

// ============================================================================
// Scheduler Tests
// ============================================================================

mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn test_scheduler_ticks_until_shutdown() {
        let h = harness(DateFixtures::first_due()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            TickScheduler::new(h.engine.clone(), Duration::from_millis(10)).spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();
        let ticks = handle.await.unwrap();

        assert!(ticks >= 1);
        // repeated ticks on the same day settle the period once
        assert_eq!(h.store.event_count().await, 1);
        assert_obligation_state(&h.reload(laptop.id).await, ObligationStatus::Settled, 1);
    }

    #[tokio::test]
    async fn test_scheduler_stops_when_sender_is_dropped() {
        let h = harness(DateFixtures::opened_on()).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            TickScheduler::new(h.engine.clone(), Duration::from_secs(3600)).spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(shutdown_tx);

        let ticks = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticks, 1);
    }
}

// ============================================================================
// Report Tests
// ============================================================================

mod report_tests {
    use super::*;

    #[tokio::test]
    async fn test_tick_report_serializes_for_structured_logs() {
        let h = harness(DateFixtures::opened_on()).await;
        let laptop = h.open(TestObligationBuilder::new()).await;

        let report = h.tick(date(2025, 1, 5)).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["today"], "2025-01-05");
        assert_eq!(json["settled"][0], serde_json::json!(laptop.id));
        assert_eq!(json["failures"], serde_json::json!([]));
        assert!(report.duration_ms().is_some());
    }

    #[test]
    fn test_engine_config_reads_policy_names() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"due_day_policy":"skip"}"#).unwrap();
        assert_eq!(config.due_day_policy, DueDayPolicy::Skip);
        assert_eq!(
            EngineConfig::default().due_day_policy,
            DueDayPolicy::ClampToMonthEnd
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use core_kernel::{BillingPeriod, DueDay, Money};
    use proptest::prelude::*;
    use test_utils::due_day_strategy;

    fn plan_strategy() -> impl Strategy<Value = (Money, u32, DueDay)> {
        (1u32..=12u32).prop_flat_map(|count| {
            (
                ((count as i64 * 100)..10_000_000i64)
                    .prop_map(|minor| Money::from_minor(minor, core_kernel::Currency::BRL)),
                Just(count),
                due_day_strategy(),
            )
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_plan_settles_each_period_once_and_sums_to_total(
            (total, count, due_day) in plan_strategy()
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let h = harness(DateFixtures::opened_on()).await;
                let plan = h
                    .open(
                        TestObligationBuilder::new()
                            .with_amount(total)
                            .with_installments(count)
                            .with_due_day(due_day),
                    )
                    .await;

                // One period past the end checks nothing is settled after completion
                let mut period = BillingPeriod::new(2025, 2).unwrap();
                for _ in 0..=count {
                    let due = period
                        .due_date(due_day, DueDayPolicy::ClampToMonthEnd)
                        .unwrap();
                    h.tick(due).await;
                    h.tick(due).await;
                    period = period.next();
                }

                let events = h
                    .engine
                    .ledger_events(EventSource::Obligation(plan.id))
                    .await
                    .unwrap();
                assert_eq!(events.len(), count as usize);
                assert_no_duplicate_events(&events);
                assert_installment_sequence(&events, plan.id);

                let settled = events.iter().fold(Money::zero(total.currency()), |sum, e| {
                    sum.checked_add(&e.amount).unwrap()
                });
                assert_eq!(settled, total);
                assert_eq!(h.engine.balance(h.account).await.unwrap(), -total);
                assert_obligation_state(&h.reload(plan.id).await, ObligationStatus::Completed, count);
            });
        }
    }
}
