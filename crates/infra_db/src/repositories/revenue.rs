//! Revenue repository implementation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{AccountId, Currency, DueDay, RevenueId};
use domain_obligation::Revenue;

use super::{money_column, parse_column};
use crate::error::DatabaseError;

const COLUMNS: &str = "revenue_id, account_id, kind, description, currency, amount, due_day, \
    receipt_date, status, received_on, active, registered_on, version, created_at, updated_at";

/// Database row for a revenue
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RevenueRow {
    pub revenue_id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub description: String,
    pub currency: String,
    pub amount: Decimal,
    pub due_day: Option<i16>,
    pub receipt_date: NaiveDate,
    pub status: String,
    pub received_on: Option<NaiveDate>,
    pub active: bool,
    pub registered_on: NaiveDate,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RevenueRow> for Revenue {
    type Error = DatabaseError;

    fn try_from(row: RevenueRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        let due_day = row
            .due_day
            .map(|day| {
                u32::try_from(day)
                    .ok()
                    .and_then(|day| DueDay::new(day).ok())
                    .ok_or_else(|| DatabaseError::decode("due_day", day))
            })
            .transpose()?;

        Ok(Revenue {
            id: RevenueId::from_uuid(row.revenue_id),
            account_id: AccountId::from_uuid(row.account_id),
            kind: parse_column("kind", &row.kind)?,
            description: row.description,
            amount: money_column(row.amount, currency),
            due_day,
            receipt_date: row.receipt_date,
            status: parse_column("status", &row.status)?,
            received_on: row.received_on,
            active: row.active,
            registered_on: row.registered_on,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for revenues
#[derive(Debug, Clone)]
pub struct RevenueRepository {
    pool: PgPool,
}

impl RevenueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, revenue: &Revenue) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO revenues ({COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(*revenue.id.as_uuid())
        .bind(*revenue.account_id.as_uuid())
        .bind(revenue.kind.as_str())
        .bind(&revenue.description)
        .bind(revenue.amount.currency().code())
        .bind(revenue.amount.amount())
        .bind(revenue.due_day.map(|day| day.get() as i16))
        .bind(revenue.receipt_date)
        .bind(revenue.status.as_str())
        .bind(revenue.received_on)
        .bind(revenue.active)
        .bind(revenue.registered_on)
        .bind(revenue.version)
        .bind(revenue.created_at)
        .bind(revenue.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: RevenueId) -> Result<Option<Revenue>, DatabaseError> {
        let row = sqlx::query_as::<_, RevenueRow>(&format!(
            "SELECT {COLUMNS} FROM revenues WHERE revenue_id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Revenue::try_from).transpose()
    }

    /// Active PENDING revenues whose receipt date is on or before `today`
    pub async fn find_receivable(&self, today: NaiveDate) -> Result<Vec<Revenue>, DatabaseError> {
        let rows = sqlx::query_as::<_, RevenueRow>(&format!(
            "SELECT {COLUMNS} FROM revenues \
             WHERE active AND status = 'PENDING' AND receipt_date <= $1 \
             ORDER BY receipt_date, revenue_id"
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Revenue::try_from).collect()
    }

    pub async fn save(&self, revenue: &Revenue) -> Result<Revenue, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::save_in(&mut conn, revenue).await
    }

    /// Writes the mutable state of a revenue if its version still matches
    pub async fn save_in(conn: &mut PgConnection, revenue: &Revenue) -> Result<Revenue, DatabaseError> {
        let row = sqlx::query_as::<_, RevenueRow>(&format!(
            "UPDATE revenues SET \
                 status = $3, received_on = $4, active = $5, receipt_date = $6, \
                 updated_at = $7, version = version + 1 \
             WHERE revenue_id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        ))
        .bind(*revenue.id.as_uuid())
        .bind(revenue.version)
        .bind(revenue.status.as_str())
        .bind(revenue.received_on)
        .bind(revenue.active)
        .bind(revenue.receipt_date)
        .bind(revenue.updated_at)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Revenue::try_from(row),
            None => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM revenues WHERE revenue_id = $1)",
                )
                .bind(*revenue.id.as_uuid())
                .fetch_one(&mut *conn)
                .await?;

                if exists {
                    Err(DatabaseError::version_conflict("Revenue", revenue.id, revenue.version))
                } else {
                    Err(DatabaseError::not_found("Revenue", revenue.id))
                }
            }
        }
    }
}
