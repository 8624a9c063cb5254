//! Tests for the in-memory settlement store

use rust_decimal_macros::dec;

use core_kernel::{AdapterHealth, AccountId, DueDayPolicy, HealthCheckable, PortError};
use domain_ledger::{BalanceAdjustment, EventSource};
use domain_obligation::{ObligationKind, ObligationStatus, RevenueStatus};
use domain_settlement::{
    BalanceLedger, InMemorySettlementStore, LedgerEventStore, ObligationStore, RevenueStore,
    SettlementCommit, SettlementUnitOfWork,
};
use test_utils::{
    assert_money_eq, AccountFixtures, DateFixtures, MoneyFixtures, TestObligationBuilder,
    TestRevenueBuilder,
};

async fn store_with_checking() -> InMemorySettlementStore {
    let store = InMemorySettlementStore::default();
    store.open_account(&AccountFixtures::checking()).await.unwrap();
    store
}

#[tokio::test]
async fn test_save_bumps_version() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    ObligationStore::insert(&store, &obligation).await.unwrap();

    let saved = ObligationStore::save(&store, &obligation).await.unwrap();
    assert_eq!(saved.version, 1);

    let stored = ObligationStore::find_by_id(&store, obligation.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn test_save_with_stale_version_conflicts() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    ObligationStore::insert(&store, &obligation).await.unwrap();
    ObligationStore::save(&store, &obligation).await.unwrap();

    let result = ObligationStore::save(&store, &obligation).await;
    assert!(matches!(result, Err(PortError::Conflict { .. })));
}

#[tokio::test]
async fn test_insert_twice_conflicts() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    ObligationStore::insert(&store, &obligation).await.unwrap();

    let result = ObligationStore::insert(&store, &obligation).await;
    assert!(result.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_find_by_due_day_filters_status_and_kind() {
    let store = store_with_checking().await;
    let pending = TestObligationBuilder::new().build();
    let settled = TestObligationBuilder::new()
        .settled_on(DateFixtures::first_due())
        .build();
    let single = TestObligationBuilder::new()
        .with_kind(ObligationKind::Single)
        .with_installments(1)
        .build();
    let inactive = TestObligationBuilder::new().inactive().build();
    for obligation in [&pending, &settled, &single, &inactive] {
        ObligationStore::insert(&store, obligation).await.unwrap();
    }

    let found = store
        .find_active_by_status_and_due_day(
            ObligationStatus::Pending,
            &ObligationKind::RECURRING,
            5,
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, pending.id);

    let active = store.find_active(&ObligationKind::RECURRING).await.unwrap();
    assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn test_commit_applies_every_part() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    ObligationStore::insert(&store, &obligation).await.unwrap();

    let settlement = obligation
        .settle(DateFixtures::first_due(), DueDayPolicy::default())
        .unwrap();
    let event_id = settlement.event.id;
    let outcome = store
        .commit(SettlementCommit::for_obligation(settlement))
        .await
        .unwrap();

    assert_eq!(outcome.event_id, event_id);
    assert_money_eq(&outcome.balance, dec!(-333.33));

    let stored = ObligationStore::find_by_id(&store, obligation.id).await.unwrap().unwrap();
    assert_eq!(stored.current_installment, 1);
    assert_eq!(stored.version, 1);
    assert!(store
        .exists_for(EventSource::Obligation(obligation.id), DateFixtures::first_due())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_commit_for_missing_account_changes_nothing() {
    let store = store_with_checking().await;
    let orphan = AccountId::new();
    let obligation = TestObligationBuilder::new().with_account(orphan).build();
    ObligationStore::insert(&store, &obligation).await.unwrap();

    let settlement = obligation
        .settle(DateFixtures::first_due(), DueDayPolicy::default())
        .unwrap();
    let result = store.commit(SettlementCommit::for_obligation(settlement)).await;

    match result {
        Err(PortError::NotFound { entity_type, .. }) => assert_eq!(entity_type, "Account"),
        other => panic!("expected a missing account, got {:?}", other),
    }
    let stored = ObligationStore::find_by_id(&store, obligation.id).await.unwrap().unwrap();
    assert_eq!(stored, obligation);
    assert_eq!(store.event_count().await, 0);
}

#[tokio::test]
async fn test_commit_with_stale_version_changes_nothing() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    ObligationStore::insert(&store, &obligation).await.unwrap();
    ObligationStore::save(&store, &obligation).await.unwrap();

    let settlement = obligation
        .settle(DateFixtures::first_due(), DueDayPolicy::default())
        .unwrap();
    let result = store.commit(SettlementCommit::for_obligation(settlement)).await;

    assert!(result.unwrap_err().is_conflict());
    assert_eq!(store.event_count().await, 0);
    assert!(store
        .balance(AccountFixtures::checking_id())
        .await
        .unwrap()
        .unwrap()
        .is_zero());
}

#[tokio::test]
async fn test_duplicate_event_is_rejected() {
    let store = store_with_checking().await;
    let obligation = TestObligationBuilder::new().build();
    let settlement = obligation
        .settle(DateFixtures::first_due(), DueDayPolicy::default())
        .unwrap();

    store.append(&settlement.event).await.unwrap();
    let mut again = settlement.event.clone();
    again.id = core_kernel::LedgerEventId::new();

    assert!(store.append(&again).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_adjust_unknown_account_is_not_found() {
    let store = store_with_checking().await;
    let adjustment = BalanceAdjustment::debit(AccountId::new(), MoneyFixtures::brl_50());

    let result = store.adjust(adjustment.account_id, adjustment.delta).await;
    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_find_receivable_orders_by_receipt_date() {
    let store = store_with_checking().await;
    let later = TestRevenueBuilder::fixed_on(DateFixtures::date(2025, 1, 20))
        .request()
        .register(DueDayPolicy::default())
        .unwrap();
    let earlier = TestRevenueBuilder::fixed_on(DateFixtures::date(2025, 1, 10))
        .request()
        .register(DueDayPolicy::default())
        .unwrap();
    let future = TestRevenueBuilder::fixed_on(DateFixtures::date(2025, 3, 1))
        .request()
        .register(DueDayPolicy::default())
        .unwrap();
    for revenue in [&later, &earlier, &future] {
        RevenueStore::insert(&store, revenue).await.unwrap();
    }

    let receivable = store
        .find_receivable(DateFixtures::date(2025, 1, 31))
        .await
        .unwrap();
    let ids: Vec<_> = receivable.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![earlier.id, later.id]);
    assert!(receivable.iter().all(|r| r.status == RevenueStatus::Pending));
}

#[tokio::test]
async fn test_health_check_reports_healthy() {
    let store = InMemorySettlementStore::default();
    let health = store.health_check().await;
    assert_eq!(health.status, AdapterHealth::Healthy);
}
