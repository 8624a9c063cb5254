//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the settlement
//! engine. These fixtures are designed to be consistent and predictable for
//! unit tests.

use chrono::NaiveDate;
use core_kernel::{AccountId, Currency, DueDay, Money};
use domain_ledger::Account;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// The laptop purchase split in three installments
    pub fn brl_1000() -> Money {
        Money::new(dec!(1000.00), Currency::BRL)
    }

    /// A monthly subscription
    pub fn brl_rent() -> Money {
        Money::new(dec!(1500.00), Currency::BRL)
    }

    /// A single purchase
    pub fn brl_50() -> Money {
        Money::new(dec!(50.00), Currency::BRL)
    }

    /// A monthly salary
    pub fn brl_salary() -> Money {
        Money::new(dec!(4200.00), Currency::BRL)
    }

    pub fn brl_zero() -> Money {
        Money::zero(Currency::BRL)
    }

    /// Creates a USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for business dates
pub struct DateFixtures;

impl DateFixtures {
    /// Builds a date, panicking on an invalid one
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// Date on which the standard obligations are opened
    pub fn opened_on() -> NaiveDate {
        Self::date(2025, 1, 2)
    }

    /// First due date of an obligation anchored on the 5th
    pub fn first_due() -> NaiveDate {
        Self::date(2025, 1, 5)
    }

    /// A 30-day month's last day
    pub fn april_30() -> NaiveDate {
        Self::date(2025, 4, 30)
    }

    /// Last day of a non-leap February
    pub fn february_28() -> NaiveDate {
        Self::date(2025, 2, 28)
    }
}

/// Fixture for due days
pub struct DueDayFixtures;

impl DueDayFixtures {
    pub fn fifth() -> DueDay {
        DueDay::new(5).expect("valid due day")
    }

    pub fn thirty_first() -> DueDay {
        DueDay::new(31).expect("valid due day")
    }

    pub fn day(day: u32) -> DueDay {
        DueDay::new(day).expect("valid due day")
    }
}

/// Fixture for accounts
pub struct AccountFixtures;

impl AccountFixtures {
    /// A fixed account id for deterministic tests
    pub fn checking_id() -> AccountId {
        AccountId::from_uuid(Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0001))
    }

    /// A BRL checking account opened at zero
    pub fn checking() -> Account {
        Account::new(Self::checking_id(), "Checking", Currency::BRL)
    }

    /// A fresh BRL account with a random id
    pub fn fresh(name: &str) -> Account {
        Account::new(AccountId::new(), name, Currency::BRL)
    }

    /// A BRL account opened with `opening` already on it
    pub fn with_opening(opening: Money) -> Account {
        Account::new(AccountId::new(), "Savings", opening.currency()).with_opening_balance(opening)
    }
}

/// Fixture for descriptions
pub struct StringFixtures;

impl StringFixtures {
    pub fn laptop() -> &'static str {
        "Laptop"
    }

    pub fn rent() -> &'static str {
        "Rent"
    }

    pub fn coffee() -> &'static str {
        "Coffee beans"
    }

    pub fn salary() -> &'static str {
        "Salary"
    }
}
