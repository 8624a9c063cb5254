//! Repository implementations for the settlement store
//!
//! Repositories encapsulate SQL and map between database rows and domain
//! types. Every write has an `_in` form taking a connection so that the
//! unit of work can run several of them inside one transaction.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Runtime-checked queries with bound parameters
//! - Transaction support for multi-table writes
//! - Optimistic concurrency control on mutable aggregates

pub mod obligation;
pub mod ledger;
pub mod revenue;

pub use obligation::{ObligationRepository, ObligationRow};
pub use ledger::{AccountRow, LedgerEventRow, LedgerRepository};
pub use revenue::{RevenueRepository, RevenueRow};

use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;

use core_kernel::{Currency, Money};

use crate::error::DatabaseError;

/// Parses a stored text column into its domain value
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DatabaseError::decode(column, e))
}

/// Rebuilds a money value from its amount and currency columns
pub(crate) fn money_column(amount: Decimal, currency: Currency) -> Money {
    Money::new(amount, currency)
}

/// Converts a stored integer into an unsigned counter
pub(crate) fn count_column(column: &str, value: i32) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|e| DatabaseError::decode(column, e))
}
