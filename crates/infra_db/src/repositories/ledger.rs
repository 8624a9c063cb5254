//! Ledger repository implementation
//!
//! This module provides database access for accounts, their running
//! balances and the append-only ledger event log.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{AccountId, Currency, LedgerEventId, Money};
use domain_ledger::{Account, EventSource, LedgerEvent, SourceKind};

use super::{count_column, money_column, parse_column};
use crate::error::DatabaseError;

const EVENT_COLUMNS: &str = "event_id, account_id, source_kind, source_id, flow, currency, \
    amount, occurred_on, installment_number, status, description, recorded_at";

/// Database row for an account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub name: String,
    pub currency: String,
    pub opening_balance: Decimal,
    pub balance: Decimal,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AccountRow {
    /// Current balance of the account
    pub fn balance(&self) -> Result<Money, DatabaseError> {
        let currency: Currency = parse_column("currency", &self.currency)?;
        Ok(money_column(self.balance, currency))
    }
}

/// Database row for a ledger event
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEventRow {
    pub event_id: Uuid,
    pub account_id: Uuid,
    pub source_kind: String,
    pub source_id: Uuid,
    pub flow: String,
    pub currency: String,
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    pub installment_number: Option<i32>,
    pub status: String,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<LedgerEventRow> for LedgerEvent {
    type Error = DatabaseError;

    fn try_from(row: LedgerEventRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        let kind: SourceKind = parse_column("source_kind", &row.source_kind)?;

        Ok(LedgerEvent {
            id: LedgerEventId::from_uuid(row.event_id),
            account_id: AccountId::from_uuid(row.account_id),
            source: EventSource::from_parts(kind, row.source_id),
            flow: parse_column("flow", &row.flow)?,
            amount: money_column(row.amount, currency),
            occurred_on: row.occurred_on,
            installment_number: row
                .installment_number
                .map(|n| count_column("installment_number", n))
                .transpose()?,
            status: parse_column("status", &row.status)?,
            description: row.description,
            recorded_at: row.recorded_at,
        })
    }
}

/// Repository for accounts, balances and ledger events
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens an account with its balance at the opening balance
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the account exists
    pub async fn open_account(&self, account: &Account) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, name, currency, opening_balance, balance,
                description, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $4, $5, $6, $7)
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(&account.name)
        .bind(account.currency.code())
        .bind(account.opening_balance.amount())
        .bind(&account.description)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_account(&self, id: AccountId) -> Result<Option<AccountRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT account_id, name, currency, opening_balance, balance,
                   description, is_active, created_at
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Current balance, or None for an unknown account
    pub async fn balance(&self, id: AccountId) -> Result<Option<Money>, DatabaseError> {
        self.find_account(id)
            .await?
            .map(|row| row.balance())
            .transpose()
    }

    pub async fn adjust(&self, id: AccountId, delta: Money) -> Result<Money, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::adjust_in(&mut conn, id, delta).await
    }

    /// Adds a signed delta to an active account's balance in place
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` if the account does not exist
    /// - `DatabaseError::ConstraintViolation` if the account is inactive or
    ///   uses another currency
    pub async fn adjust_in(
        conn: &mut PgConnection,
        id: AccountId,
        delta: Money,
    ) -> Result<Money, DatabaseError> {
        let updated: Option<Decimal> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE account_id = $1 AND is_active AND currency = $3
            RETURNING balance
            "#,
        )
        .bind(*id.as_uuid())
        .bind(delta.amount())
        .bind(delta.currency().code())
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(balance) = updated {
            return Ok(money_column(balance, delta.currency()));
        }

        let account: Option<(String, bool)> =
            sqlx::query_as("SELECT currency, is_active FROM accounts WHERE account_id = $1")
                .bind(*id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?;

        match account {
            None => Err(DatabaseError::not_found("Account", id)),
            Some((_, false)) => Err(DatabaseError::ConstraintViolation(format!(
                "account {} is inactive",
                id
            ))),
            Some((currency, true)) => Err(DatabaseError::ConstraintViolation(format!(
                "account {} holds {}, cannot apply {}",
                id,
                currency.trim(),
                delta
            ))),
        }
    }

    pub async fn append(&self, event: &LedgerEvent) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::append_in(&mut conn, event).await
    }

    /// Appends an event to the log
    ///
    /// # Errors
    ///
    /// - `DatabaseError::DuplicateEntry` if the source already has an event that day
    /// - `DatabaseError::ForeignKeyViolation` if the account does not exist
    pub async fn append_in(conn: &mut PgConnection, event: &LedgerEvent) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO ledger_events ({EVENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(*event.id.as_uuid())
        .bind(*event.account_id.as_uuid())
        .bind(event.source.kind().as_str())
        .bind(event.source.uuid())
        .bind(event.flow.as_str())
        .bind(event.amount.currency().code())
        .bind(event.amount.amount())
        .bind(event.occurred_on)
        .bind(event.installment_number.map(|n| n as i32))
        .bind(event.status.as_str())
        .bind(&event.description)
        .bind(event.recorded_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Returns true if the source already has an event on that date
    pub async fn exists_for(
        &self,
        source: EventSource,
        occurred_on: NaiveDate,
    ) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ledger_events
                WHERE source_kind = $1 AND source_id = $2 AND occurred_on = $3
            )
            "#,
        )
        .bind(source.kind().as_str())
        .bind(source.uuid())
        .bind(occurred_on)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Events of a source, oldest first
    pub async fn find_by_source(&self, source: EventSource) -> Result<Vec<LedgerEvent>, DatabaseError> {
        let rows = sqlx::query_as::<_, LedgerEventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events \
             WHERE source_kind = $1 AND source_id = $2 \
             ORDER BY occurred_on, recorded_at"
        ))
        .bind(source.kind().as_str())
        .bind(source.uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEvent::try_from).collect()
    }

    /// Events of an account between two dates, inclusive
    pub async fn find_by_account(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LedgerEvent>, DatabaseError> {
        let rows = sqlx::query_as::<_, LedgerEventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events \
             WHERE account_id = $1 AND occurred_on BETWEEN $2 AND $3 \
             ORDER BY occurred_on, recorded_at"
        ))
        .bind(*account_id.as_uuid())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEvent::try_from).collect()
    }
}
