use crate::store::{StoreError, Transaction};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

/// Consumer of the "transaction completed" domain event.
///
/// Fired by the reconciler exactly once per committed transition into
/// COMPLETED: only by the CAS winner, never on a no-op path.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn transaction_completed(&self, tx: &Transaction) -> Result<(), StoreError>;
}

/// A queued confirmation to be delivered by the notification worker.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationJob {
    pub id: i64,
    pub order_id: Uuid,
    pub email: String,
    pub amount: BigDecimal,
    pub queued_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Durable notification queue backed by Postgres.
///
/// The enqueue deduplicates on `order_id`, so even if two completion events
/// were ever produced for one transaction, at most one job exists. Delivery
/// is at-least-once; the mailer downstream is responsible for idempotent
/// sending.
pub struct PgNotificationQueue {
    pool: PgPool,
}

impl PgNotificationQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_unsent(&self, limit: i64) -> Result<Vec<NotificationJob>, StoreError> {
        sqlx::query_as::<_, NotificationJob>(
            "SELECT id, order_id, email, amount, queued_at, sent_at \
             FROM notification_jobs \
             WHERE sent_at IS NULL \
             ORDER BY queued_at ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    pub async fn mark_sent(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_jobs SET sent_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for PgNotificationQueue {
    async fn transaction_completed(&self, tx: &Transaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO notification_jobs (order_id, email, amount) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(tx.order_id)
        .bind(&tx.payer_email)
        .bind(&tx.amount)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        if result.rows_affected() == 1 {
            info!(order_id = %tx.order_id, "queued payment confirmation");
        }
        Ok(())
    }
}

/// Delivers queued confirmations.
///
/// Placeholder for a real mailer integration; for now the send is a
/// structured log line carrying everything the template needs.
pub struct ConfirmationMailer;

impl ConfirmationMailer {
    pub fn new() -> Self {
        Self
    }

    pub async fn send_confirmation(&self, job: &NotificationJob) {
        info!(
            order_id = %job.order_id,
            email = %job.email,
            amount = %job.amount,
            "🔔 NOTIFICATION: payment confirmation email"
        );
    }
}

impl Default for ConfirmationMailer {
    fn default() -> Self {
        Self::new()
    }
}
