//! Signed balance adjustments

use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, Money};

use crate::event::Flow;

/// A signed change to one account's balance
///
/// Negative deltas are debits (money leaving), positive deltas are credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    /// Account whose balance changes
    pub account_id: AccountId,
    /// Signed amount added to the balance
    pub delta: Money,
}

impl BalanceAdjustment {
    /// Subtracts `amount` from the balance
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            delta: -amount.abs(),
        }
    }

    /// Adds `amount` to the balance
    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            delta: amount.abs(),
        }
    }

    /// Adjustment caused by moving `amount` in the given direction
    pub fn for_flow(account_id: AccountId, flow: Flow, amount: Money) -> Self {
        match flow {
            Flow::Outflow => Self::debit(account_id, amount),
            Flow::Inflow => Self::credit(account_id, amount),
        }
    }

    /// Returns true if this adjustment lowers the balance
    pub fn is_debit(&self) -> bool {
        self.delta.is_negative()
    }
}
