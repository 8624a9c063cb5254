//! Obligation repository implementation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{AccountId, Currency, DueDay, ObligationId};
use domain_obligation::{Obligation, ObligationKind, ObligationStatus};

use super::{count_column, money_column, parse_column};
use crate::error::DatabaseError;

const COLUMNS: &str = "obligation_id, account_id, kind, flow, description, currency, \
    total_amount, installment_amount, total_installments, current_installment, due_day, \
    status, active, last_settled_at, opened_on, version, created_at, updated_at";

/// Database row for an obligation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ObligationRow {
    pub obligation_id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub flow: String,
    pub description: String,
    pub currency: String,
    pub total_amount: Decimal,
    pub installment_amount: Option<Decimal>,
    pub total_installments: i32,
    pub current_installment: i32,
    pub due_day: i16,
    pub status: String,
    pub active: bool,
    pub last_settled_at: Option<NaiveDate>,
    pub opened_on: NaiveDate,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ObligationRow> for Obligation {
    type Error = DatabaseError;

    fn try_from(row: ObligationRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse_column("currency", &row.currency)?;
        let due_day = u32::try_from(row.due_day)
            .ok()
            .and_then(|day| DueDay::new(day).ok())
            .ok_or_else(|| DatabaseError::decode("due_day", row.due_day))?;

        Ok(Obligation {
            id: ObligationId::from_uuid(row.obligation_id),
            account_id: AccountId::from_uuid(row.account_id),
            kind: parse_column("kind", &row.kind)?,
            flow: parse_column("flow", &row.flow)?,
            description: row.description,
            total_amount: money_column(row.total_amount, currency),
            installment_amount: row
                .installment_amount
                .map(|amount| money_column(amount, currency)),
            total_installments: count_column("total_installments", row.total_installments)?,
            current_installment: count_column("current_installment", row.current_installment)?,
            due_day,
            status: parse_column("status", &row.status)?,
            active: row.active,
            last_settled_at: row.last_settled_at,
            opened_on: row.opened_on,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all(rows: Vec<ObligationRow>) -> Result<Vec<Obligation>, DatabaseError> {
    rows.into_iter().map(Obligation::try_from).collect()
}

fn kind_names(kinds: &[ObligationKind]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

/// Repository for obligations
#[derive(Debug, Clone)]
pub struct ObligationRepository {
    pool: PgPool,
}

impl ObligationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active obligations with the given status, kinds and due day
    pub async fn find_active_by_status_and_due_day(
        &self,
        status: ObligationStatus,
        kinds: &[ObligationKind],
        due_day: u32,
    ) -> Result<Vec<Obligation>, DatabaseError> {
        let rows = sqlx::query_as::<_, ObligationRow>(&format!(
            "SELECT {COLUMNS} FROM obligations \
             WHERE active AND status = $1 AND kind = ANY($2) AND due_day = $3 \
             ORDER BY obligation_id"
        ))
        .bind(status.as_str())
        .bind(kind_names(kinds))
        .bind(due_day as i16)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    pub async fn find_active(
        &self,
        kinds: &[ObligationKind],
    ) -> Result<Vec<Obligation>, DatabaseError> {
        let rows = sqlx::query_as::<_, ObligationRow>(&format!(
            "SELECT {COLUMNS} FROM obligations WHERE active AND kind = ANY($1) \
             ORDER BY obligation_id"
        ))
        .bind(kind_names(kinds))
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    pub async fn find_by_id(&self, id: ObligationId) -> Result<Option<Obligation>, DatabaseError> {
        let row = sqlx::query_as::<_, ObligationRow>(&format!(
            "SELECT {COLUMNS} FROM obligations WHERE obligation_id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Obligation::try_from).transpose()
    }

    /// Inserts a new obligation
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the id is taken
    pub async fn insert(&self, obligation: &Obligation) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO obligations ({COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(*obligation.id.as_uuid())
        .bind(*obligation.account_id.as_uuid())
        .bind(obligation.kind.as_str())
        .bind(obligation.flow.as_str())
        .bind(&obligation.description)
        .bind(obligation.total_amount.currency().code())
        .bind(obligation.total_amount.amount())
        .bind(obligation.installment_amount.map(|m| m.amount()))
        .bind(obligation.total_installments as i32)
        .bind(obligation.current_installment as i32)
        .bind(obligation.due_day.get() as i16)
        .bind(obligation.status.as_str())
        .bind(obligation.active)
        .bind(obligation.last_settled_at)
        .bind(obligation.opened_on)
        .bind(obligation.version)
        .bind(obligation.created_at)
        .bind(obligation.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save(&self, obligation: &Obligation) -> Result<Obligation, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::save_in(&mut conn, obligation).await
    }

    /// Writes the mutable state of an obligation if its version still matches
    ///
    /// # Returns
    ///
    /// The stored obligation with its bumped version
    ///
    /// # Errors
    ///
    /// - `DatabaseError::VersionConflict` if the stored version moved on
    /// - `DatabaseError::NotFound` if the obligation does not exist
    pub async fn save_in(
        conn: &mut PgConnection,
        obligation: &Obligation,
    ) -> Result<Obligation, DatabaseError> {
        let row = sqlx::query_as::<_, ObligationRow>(&format!(
            "UPDATE obligations SET \
                 status = $3, active = $4, current_installment = $5, last_settled_at = $6, \
                 description = $7, updated_at = $8, version = version + 1 \
             WHERE obligation_id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        ))
        .bind(*obligation.id.as_uuid())
        .bind(obligation.version)
        .bind(obligation.status.as_str())
        .bind(obligation.active)
        .bind(obligation.current_installment as i32)
        .bind(obligation.last_settled_at)
        .bind(&obligation.description)
        .bind(obligation.updated_at)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Obligation::try_from(row),
            None => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM obligations WHERE obligation_id = $1)",
                )
                .bind(*obligation.id.as_uuid())
                .fetch_one(&mut *conn)
                .await?;

                if exists {
                    Err(DatabaseError::version_conflict(
                        "Obligation",
                        obligation.id,
                        obligation.version,
                    ))
                } else {
                    Err(DatabaseError::not_found("Obligation", obligation.id))
                }
            }
        }
    }
}
