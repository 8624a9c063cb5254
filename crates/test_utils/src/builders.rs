//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{NaiveDate, Utc};
use core_kernel::{AccountId, DueDay, Money, ObligationId};
use domain_ledger::Flow;
use domain_obligation::{
    NewObligation, NewRevenue, Obligation, ObligationKind, ObligationStatus, RevenueKind,
};

use crate::fixtures::{AccountFixtures, DateFixtures, DueDayFixtures, MoneyFixtures, StringFixtures};

/// Builder for obligations
///
/// `request()` produces a creation request that goes through validation;
/// `build()` produces a stored obligation as-is, including malformed ones.
pub struct TestObligationBuilder {
    id: ObligationId,
    account_id: AccountId,
    kind: ObligationKind,
    flow: Flow,
    description: String,
    amount: Money,
    installments: u32,
    installment_amount: Option<Option<Money>>,
    current_installment: u32,
    due_day: DueDay,
    status: ObligationStatus,
    active: bool,
    last_settled_at: Option<NaiveDate>,
    opened_on: NaiveDate,
}

impl Default for TestObligationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestObligationBuilder {
    /// The 1000.00 laptop in three installments due on the 5th
    pub fn new() -> Self {
        Self {
            id: ObligationId::new_v7(),
            account_id: AccountFixtures::checking_id(),
            kind: ObligationKind::Installment,
            flow: Flow::Outflow,
            description: StringFixtures::laptop().to_string(),
            amount: MoneyFixtures::brl_1000(),
            installments: 3,
            installment_amount: None,
            current_installment: 0,
            due_day: DueDayFixtures::fifth(),
            status: ObligationStatus::Pending,
            active: true,
            last_settled_at: None,
            opened_on: DateFixtures::opened_on(),
        }
    }

    /// A fixed monthly rent for `periods` months
    pub fn rent(periods: u32) -> Self {
        Self::new()
            .with_kind(ObligationKind::FixedRecurring)
            .with_description(StringFixtures::rent())
            .with_amount(MoneyFixtures::brl_rent())
            .with_installments(periods)
    }

    pub fn with_id(mut self, id: ObligationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn with_kind(mut self, kind: ObligationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Total for installment plans, per-period amount for fixed recurring
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_installments(mut self, installments: u32) -> Self {
        self.installments = installments;
        self
    }

    /// Overrides the stored installment amount, `None` leaving it missing
    pub fn with_installment_amount(mut self, amount: Option<Money>) -> Self {
        self.installment_amount = Some(amount);
        self
    }

    pub fn with_current_installment(mut self, current: u32) -> Self {
        self.current_installment = current;
        self
    }

    pub fn with_due_day(mut self, due_day: DueDay) -> Self {
        self.due_day = due_day;
        self
    }

    pub fn with_status(mut self, status: ObligationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Marks the obligation SETTLED on `date`
    pub fn settled_on(mut self, date: NaiveDate) -> Self {
        self.status = ObligationStatus::Settled;
        self.last_settled_at = Some(date);
        self
    }

    pub fn with_opened_on(mut self, opened_on: NaiveDate) -> Self {
        self.opened_on = opened_on;
        self
    }

    /// Builds the creation request
    pub fn request(&self) -> NewObligation {
        let request = match self.kind {
            ObligationKind::Installment => NewObligation::installment(
                self.account_id,
                self.description.clone(),
                self.amount,
                self.installments,
                self.due_day,
                self.opened_on,
            ),
            ObligationKind::FixedRecurring => NewObligation::fixed_recurring(
                self.account_id,
                self.description.clone(),
                self.amount,
                self.installments,
                self.due_day,
                self.opened_on,
            ),
            ObligationKind::Single => NewObligation::single(
                self.account_id,
                self.description.clone(),
                self.amount,
                self.opened_on,
            ),
        };
        request.with_flow(self.flow)
    }

    /// Builds the obligation without validation
    ///
    /// The installment amount defaults to the banker's-rounded share of the
    /// total.
    pub fn build(&self) -> Obligation {
        let total_amount = match self.kind {
            ObligationKind::FixedRecurring => self.amount.times(self.installments),
            _ => self.amount,
        };
        let installment_amount = match self.installment_amount {
            Some(amount) => amount,
            None => total_amount.installment_share(self.installments.max(1)).ok(),
        };

        let now = Utc::now();
        Obligation {
            id: self.id,
            account_id: self.account_id,
            kind: self.kind,
            flow: self.flow,
            description: self.description.clone(),
            total_amount,
            installment_amount,
            total_installments: self.installments,
            current_installment: self.current_installment,
            due_day: self.due_day,
            status: self.status,
            active: self.active,
            last_settled_at: self.last_settled_at,
            opened_on: self.opened_on,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Builder for revenue registrations
pub struct TestRevenueBuilder {
    account_id: AccountId,
    kind: RevenueKind,
    description: String,
    amount: Money,
    due_day: Option<DueDay>,
    receipt_date: Option<NaiveDate>,
    registered_on: NaiveDate,
}

impl Default for TestRevenueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRevenueBuilder {
    /// A one-off salary payment registered on the standard opening date
    pub fn new() -> Self {
        Self {
            account_id: AccountFixtures::checking_id(),
            kind: RevenueKind::OneOff,
            description: StringFixtures::salary().to_string(),
            amount: MoneyFixtures::brl_salary(),
            due_day: None,
            receipt_date: None,
            registered_on: DateFixtures::opened_on(),
        }
    }

    /// A fixed revenue expected on `receipt_date`
    pub fn fixed_on(receipt_date: NaiveDate) -> Self {
        let mut builder = Self::new();
        builder.kind = RevenueKind::Fixed;
        builder.receipt_date = Some(receipt_date);
        builder
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_due_day(mut self, due_day: DueDay) -> Self {
        self.due_day = Some(due_day);
        self
    }

    pub fn with_registered_on(mut self, registered_on: NaiveDate) -> Self {
        self.registered_on = registered_on;
        self
    }

    pub fn request(&self) -> NewRevenue {
        let request = match self.kind {
            RevenueKind::OneOff => NewRevenue::one_off(
                self.account_id,
                self.description.clone(),
                self.amount,
                self.registered_on,
            ),
            RevenueKind::Fixed => NewRevenue::fixed(
                self.account_id,
                self.description.clone(),
                self.amount,
                self.registered_on,
            ),
        };
        let request = match self.receipt_date {
            Some(date) => request.with_receipt_date(date),
            None => request,
        };
        match self.due_day {
            Some(day) => request.with_due_day(day),
            None => request,
        }
    }
}
