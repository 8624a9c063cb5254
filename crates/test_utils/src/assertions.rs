//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{Money, ObligationId};
use domain_ledger::{EventSource, LedgerEvent};
use domain_obligation::{Obligation, ObligationStatus};
use rust_decimal::Decimal;

/// Asserts that a Money value has the given amount
///
/// # Panics
///
/// Panics if the amounts differ
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Money amount mismatch: actual={}, expected={} {}",
        actual,
        actual.currency().symbol(),
        expected
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: &Money) {
    assert!(
        money.is_negative(),
        "Expected negative money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that the regular installments plus the final one add up to the total
pub fn assert_installments_sum_to_total(obligation: &Obligation) {
    let installment = obligation
        .installment_amount
        .expect("obligation has an installment amount");
    let n = obligation.total_installments;
    let regular = installment.times(n.saturating_sub(1));
    let last = obligation
        .total_amount
        .checked_sub(&regular)
        .expect("same currency");

    assert!(
        last.is_positive(),
        "Final installment of {} must be positive, got {}",
        obligation.id,
        last
    );
    assert_eq!(
        regular.checked_add(&last).expect("same currency"),
        obligation.total_amount,
        "Installments of {} do not add up to the total",
        obligation.id
    );
}

/// Asserts the obligation's lifecycle state
pub fn assert_obligation_state(
    obligation: &Obligation,
    status: ObligationStatus,
    current_installment: u32,
) {
    assert_eq!(
        obligation.status, status,
        "Obligation {} status mismatch",
        obligation.id
    );
    assert_eq!(
        obligation.current_installment, current_installment,
        "Obligation {} installment counter mismatch",
        obligation.id
    );
    assert_eq!(
        obligation.active,
        status != ObligationStatus::Completed,
        "Obligation {} must be inactive exactly when completed",
        obligation.id
    );
}

/// Asserts that events carry installment numbers 1..=n in order
pub fn assert_installment_sequence(events: &[LedgerEvent], obligation_id: ObligationId) {
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.source, EventSource::Obligation(obligation_id));
        assert_eq!(
            event.installment_number,
            Some(index as u32 + 1),
            "Event {} is out of sequence",
            event.id
        );
    }
}

/// Asserts that at most one event exists per (source, date)
pub fn assert_no_duplicate_events(events: &[LedgerEvent]) {
    let mut seen = std::collections::HashSet::new();
    for event in events {
        assert!(
            seen.insert((event.source, event.occurred_on)),
            "Duplicate event for {} on {}",
            event.source,
            event.occurred_on
        );
    }
}
