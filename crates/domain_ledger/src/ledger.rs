//! In-memory ledger implementation
//!
//! This module keeps accounts, their running balances and the append-only
//! event log together, so that an event and the balance change it causes
//! are applied as one step.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use core_kernel::{AccountId, Currency, Money};

use crate::account::Account;
use crate::balance::BalanceAdjustment;
use crate::error::LedgerError;
use crate::event::{EventSource, LedgerEvent};

/// The ledger for tracking realized money movements
///
/// # Invariants
///
/// - At most one event per (source, occurred_on)
/// - Account balances only change through [`Ledger::adjust`] or [`Ledger::post`]
/// - Recorded events are never modified
#[derive(Debug)]
pub struct Ledger {
    /// Known accounts
    accounts: HashMap<AccountId, Account>,
    /// Append-only event log
    events: Vec<LedgerEvent>,
    /// Uniqueness index over (source, occurred_on)
    occurrences: HashSet<(EventSource, NaiveDate)>,
    /// Running account balances
    balances: HashMap<AccountId, Money>,
    /// Default currency
    currency: Currency,
}

impl Ledger {
    /// Creates a new ledger with the specified default currency
    pub fn new(currency: Currency) -> Self {
        Self {
            accounts: HashMap::new(),
            events: Vec::new(),
            occurrences: HashSet::new(),
            balances: HashMap::new(),
            currency,
        }
    }

    /// Default currency of the ledger
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Opens an account at its opening balance
    ///
    /// # Errors
    ///
    /// Returns error if the account already exists
    pub fn open_account(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountAlreadyExists(account.id.to_string()));
        }

        let account_id = account.id;
        self.balances.insert(account_id, account.opening_balance);
        self.accounts.insert(account_id, account);

        Ok(())
    }

    /// Gets an account by ID
    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Gets the current balance of an account
    ///
    /// # Returns
    ///
    /// The current balance, or None if account doesn't exist
    pub fn balance(&self, id: &AccountId) -> Option<Money> {
        self.balances.get(id).copied()
    }

    /// Returns true if an event already exists for the source on that date
    pub fn contains(&self, source: &EventSource, occurred_on: NaiveDate) -> bool {
        self.occurrences.contains(&(*source, occurred_on))
    }

    /// Checks that `adjustment` can be applied without applying it
    pub fn check_adjustment(&self, adjustment: &BalanceAdjustment) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(&adjustment.account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(adjustment.account_id.to_string()))?;

        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.id.to_string()));
        }

        if account.currency != adjustment.delta.currency() {
            return Err(LedgerError::CalculationError(format!(
                "account {} holds {}, adjustment is in {}",
                account.id,
                account.currency,
                adjustment.delta.currency()
            )));
        }

        Ok(())
    }

    /// Checks that `event` can be recorded without recording it
    pub fn check_event(&self, event: &LedgerEvent) -> Result<(), LedgerError> {
        if !event.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(event.amount.to_string()));
        }

        if self.contains(&event.source, event.occurred_on) {
            return Err(LedgerError::DuplicateEvent {
                event_source: event.source.to_string(),
                occurred_on: event.occurred_on,
            });
        }

        self.check_adjustment(&event.adjustment())
    }

    /// Applies a signed adjustment to an account balance
    ///
    /// # Returns
    ///
    /// The balance after the adjustment
    pub fn adjust(&mut self, adjustment: &BalanceAdjustment) -> Result<Money, LedgerError> {
        self.check_adjustment(adjustment)?;

        let balance = self
            .balances
            .get_mut(&adjustment.account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(adjustment.account_id.to_string()))?;

        *balance = balance
            .checked_add(&adjustment.delta)
            .map_err(|e| LedgerError::CalculationError(e.to_string()))?;

        debug!(
            account_id = %adjustment.account_id,
            delta = %adjustment.delta,
            balance = %balance,
            "balance adjusted"
        );

        Ok(*balance)
    }

    /// Appends an event to the log without touching any balance
    pub fn record(&mut self, event: LedgerEvent) -> Result<(), LedgerError> {
        if self.contains(&event.source, event.occurred_on) {
            return Err(LedgerError::DuplicateEvent {
                event_source: event.source.to_string(),
                occurred_on: event.occurred_on,
            });
        }

        self.occurrences.insert((event.source, event.occurred_on));
        self.events.push(event);
        Ok(())
    }

    /// Records an event and applies the balance change it causes
    ///
    /// Either both happen or neither does.
    ///
    /// # Returns
    ///
    /// The balance after the event
    ///
    /// # Errors
    ///
    /// - Returns error if an event for the same source and date exists
    /// - Returns error if the account doesn't exist or is inactive
    pub fn post(&mut self, event: LedgerEvent) -> Result<Money, LedgerError> {
        self.check_event(&event)?;

        let balance = self.adjust(&event.adjustment())?;
        self.record(event)?;

        Ok(balance)
    }

    /// All events produced by a source, oldest first
    pub fn events_by_source(&self, source: &EventSource) -> Vec<&LedgerEvent> {
        self.events.iter().filter(|e| &e.source == source).collect()
    }

    /// All events recorded for an account, oldest first
    pub fn events_for(&self, account_id: &AccountId) -> Vec<&LedgerEvent> {
        self.events
            .iter()
            .filter(|e| &e.account_id == account_id)
            .collect()
    }

    /// Number of recorded events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Compares an account's balance with its opening balance plus the
    /// signed sum of its events
    pub fn reconcile(&self, account_id: &AccountId) -> Result<Reconciliation, LedgerError> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        let balance = self
            .balances
            .get(account_id)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        let mut events_total = Money::zero(account.currency);
        for event in self.events_for(account_id) {
            events_total = events_total
                .checked_add(&event.signed_amount())
                .map_err(|e| LedgerError::CalculationError(e.to_string()))?;
        }

        let expected = account
            .opening_balance
            .checked_add(&events_total)
            .map_err(|e| LedgerError::CalculationError(e.to_string()))?;

        Ok(Reconciliation {
            account_id: *account_id,
            opening_balance: account.opening_balance,
            events_total,
            balance,
            is_consistent: expected == balance,
        })
    }
}

/// Result of comparing a balance against its event history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Account checked
    pub account_id: AccountId,
    /// Balance at account opening
    pub opening_balance: Money,
    /// Signed sum of every event on the account
    pub events_total: Money,
    /// Current running balance
    pub balance: Money,
    /// Whether opening balance plus events equals the balance
    pub is_consistent: bool,
}
