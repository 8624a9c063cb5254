//! Balance-owning accounts
//!
//! Every obligation and revenue names the account whose balance it moves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, Currency, Money};

/// An account holding a single running balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Account name
    pub name: String,
    /// Currency of every movement on this account
    pub currency: Currency,
    /// Balance the account was opened with
    pub opening_balance: Money,
    /// Description
    pub description: Option<String>,
    /// Whether account is active
    pub is_active: bool,
    /// When the account was opened
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account with a zero opening balance
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier
    /// * `name` - Account name
    /// * `currency` - Currency of the balance
    pub fn new(id: AccountId, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            id,
            name: name.into(),
            currency,
            opening_balance: Money::zero(currency),
            description: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the opening balance
    pub fn with_opening_balance(mut self, opening_balance: Money) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
