use crate::store::error::StoreError;
use crate::store::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::store::TransactionStore;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "order_id, order_tracking_id, amount, currency, description, \
     payer_email, payer_phone, status, owner_reference, created_at, updated_at";

/// Raw row shape; `status` is stored as TEXT and parsed into the enum on the
/// way out.
#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    order_id: Uuid,
    order_tracking_id: Option<String>,
    amount: BigDecimal,
    currency: String,
    description: String,
    payer_email: String,
    payer_phone: Option<String>,
    status: String,
    owner_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TransactionStatus>()
            .map_err(StoreError::Backend)?;
        Ok(Transaction {
            order_id: row.order_id,
            tracking_id: row.order_tracking_id,
            amount: row.amount,
            currency: row.currency,
            description: row.description,
            payer_email: row.payer_email,
            payer_phone: row.payer_phone,
            status,
            owner_reference: row.owner_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed transaction store.
///
/// The CAS is a conditional UPDATE; Postgres row-level locking makes the
/// read-compare-write a single atomic step, so two racing reconcilers can
/// never both observe `rows_affected = 1` for the same transition.
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO transactions \
             (order_id, amount, currency, description, payer_email, payer_phone, owner_reference) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(new.order_id)
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(&new.description)
        .bind(&new.payer_email)
        .bind(&new.payer_phone)
        .bind(&new.owner_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.try_into()
    }

    async fn get_by_order_id(&self, order_id: Uuid) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn get_by_tracking_id(&self, tracking_id: &str) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_tracking_id = $1"
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn set_tracking_id(&self, order_id: Uuid, tracking_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE transactions \
             SET order_tracking_id = $2, updated_at = NOW() \
             WHERE order_id = $1 AND order_tracking_id IS NULL",
        )
        .bind(order_id)
        .bind(tracking_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish "no such record" from "tracking id already set".
        match self.get_by_order_id(order_id).await {
            Ok(_) => Err(StoreError::TrackingAssigned),
            Err(e) => Err(e),
        }
    }

    async fn compare_and_set_status(
        &self,
        order_id: Uuid,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE transactions \
             SET status = $3, updated_at = NOW() \
             WHERE order_id = $1 AND status = $2",
        )
        .bind(order_id)
        .bind(expected.as_str())
        .bind(new.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_stale_pending(
        &self,
        older_than: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE status = 'PENDING' \
               AND order_tracking_id IS NOT NULL \
               AND created_at < NOW() - INTERVAL '1 second' * $1 \
             ORDER BY created_at ASC \
             LIMIT $2"
        ))
        .bind(older_than.num_seconds())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(Transaction::try_from).collect()
    }
}
