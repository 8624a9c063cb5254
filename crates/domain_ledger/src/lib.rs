//! Ledger Domain - Balances and Realized Money Movements
//!
//! This crate records money that has actually moved for an owning account.
//! Expenses and incomes share one event log; each event is tagged with a
//! [`Flow`] that decides the sign of the balance adjustment it causes.
//!
//! # Invariants
//!
//! - Ledger events are append-only and never mutated after creation
//! - At most one event exists per (source, occurred_on) pair
//! - A balance only changes through signed adjustments
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{Account, Ledger, LedgerEvent, EventSource, Flow};
//!
//! let mut ledger = Ledger::new(Currency::BRL);
//! ledger.open_account(Account::new(account_id, "Checking", Currency::BRL))?;
//!
//! let event = LedgerEvent::new(account_id, EventSource::Obligation(id), Flow::Outflow, amount, today)
//!     .with_description("Rent");
//! let balance = ledger.post(event)?;
//! ```

pub mod account;
pub mod balance;
pub mod event;
pub mod ledger;
pub mod error;

pub use account::Account;
pub use balance::BalanceAdjustment;
pub use event::{EventSource, EventStatus, Flow, LedgerEvent, SourceKind};
pub use ledger::{Ledger, Reconciliation};
pub use error::LedgerError;
