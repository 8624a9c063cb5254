//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{Currency, DueDay, DueDayPolicy, Money};
use proptest::prelude::*;

/// Strategy for generating Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::BRL),
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::JPY),
    ]
}

/// Strategy for generating positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for generating positive BRL amounts
pub fn brl_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::BRL))
}

/// Strategy for generating positive Money in any currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(minor, currency)| Money::from_minor(minor, currency))
}

/// Strategy for generating due days, 1 through 31
pub fn due_day_strategy() -> impl Strategy<Value = DueDay> {
    (1u32..=31u32).prop_filter_map("due day in range", |day| DueDay::new(day).ok())
}

/// Strategy for generating installment counts
pub fn installment_count_strategy() -> impl Strategy<Value = u32> {
    1u32..=48u32
}

/// Strategy for generating both due-day policies
pub fn due_day_policy_strategy() -> impl Strategy<Value = DueDayPolicy> {
    prop_oneof![Just(DueDayPolicy::Skip), Just(DueDayPolicy::ClampToMonthEnd)]
}

/// Strategy for generating dates between 2020 and 2030
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..(11 * 366)).prop_filter_map("date in range", |offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1).map(|start| start + Duration::days(offset))
    })
}

/// Strategy for generating an installment plan: total, count and due day
pub fn installment_plan_strategy() -> impl Strategy<Value = (Money, u32, DueDay)> {
    (brl_money_strategy(), installment_count_strategy(), due_day_strategy())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_due_days_are_valid(day in due_day_strategy()) {
            prop_assert!((1..=31).contains(&day.get()));
        }

        #[test]
        fn test_brl_money_is_positive(money in brl_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::BRL);
        }

        #[test]
        fn test_next_occurrence_is_not_before_start(
            day in due_day_strategy(),
            from in date_strategy(),
            policy in due_day_policy_strategy(),
        ) {
            let next = policy.next_occurrence(day, from);
            prop_assert!(next.is_some());
            prop_assert!(next.unwrap() >= from);
        }
    }
}
