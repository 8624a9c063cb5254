//! Installment projections
//!
//! A read model listing every installment of an obligation with its amount,
//! projected due date and paid flag. It is derived on demand and never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{BillingPeriod, DueDayPolicy, Money, ObligationId};

use crate::error::ObligationError;
use crate::obligation::Obligation;

/// One projected installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentView {
    /// 1-based installment number
    pub number: u32,
    /// Number of installments in the plan
    pub total_installments: u32,
    /// Amount of this installment
    pub amount: Money,
    /// Projected due date
    pub due_date: NaiveDate,
    /// Whether this installment has been paid
    pub paid: bool,
}

/// Every installment of one obligation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub obligation_id: ObligationId,
    pub description: String,
    installments: Vec<InstallmentView>,
}

impl InstallmentSchedule {
    /// Projects the installments of `obligation`
    ///
    /// The first installment falls on the first resolved due date on or
    /// after the opening date; each following one a period later. Under
    /// `Skip`, months without the due day carry no installment.
    pub fn for_obligation(
        obligation: &Obligation,
        policy: DueDayPolicy,
    ) -> Result<Self, ObligationError> {
        let installment = obligation
            .installment_amount
            .filter(|amount| amount.is_positive())
            .ok_or_else(|| ObligationError::NotPayable {
                id: obligation.id,
                reason: "installment amount is missing".to_string(),
            })?;

        let total = obligation.total_installments;
        let mut installments = Vec::with_capacity(total as usize);
        let mut next_from = obligation.opened_on;

        for number in 1..=total {
            let Some(due_date) = policy.next_occurrence(obligation.due_day, next_from) else {
                break;
            };

            let amount = if number == total {
                obligation
                    .total_amount
                    .checked_sub(&installment.times(total - 1))?
            } else {
                installment
            };

            installments.push(InstallmentView {
                number,
                total_installments: total,
                amount,
                due_date,
                paid: number <= obligation.current_installment,
            });

            let following = BillingPeriod::containing(due_date).next();
            next_from = NaiveDate::from_ymd_opt(following.year, following.month, 1)
                .unwrap_or(due_date);
        }

        Ok(Self {
            obligation_id: obligation.id,
            description: obligation.description.clone(),
            installments,
        })
    }

    /// Every installment, in order
    pub fn all(&self) -> &[InstallmentView] {
        &self.installments
    }

    /// Installments not paid yet
    pub fn pending(&self) -> Vec<&InstallmentView> {
        self.installments.iter().filter(|i| !i.paid).collect()
    }

    /// Installments projected to fall due in the given month
    pub fn for_month(&self, year: i32, month: u32) -> Vec<&InstallmentView> {
        let Ok(period) = BillingPeriod::new(year, month) else {
            return Vec::new();
        };
        self.installments
            .iter()
            .filter(|i| BillingPeriod::containing(i.due_date) == period)
            .collect()
    }

    /// Sum of the installments not paid yet
    pub fn remaining_amount(&self) -> Result<Option<Money>, ObligationError> {
        let mut pending = self.pending().into_iter();
        let Some(first) = pending.next() else {
            return Ok(None);
        };

        let mut sum = first.amount;
        for view in pending {
            sum = sum.checked_add(&view.amount)?;
        }
        Ok(Some(sum))
    }
}
