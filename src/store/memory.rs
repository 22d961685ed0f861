use crate::store::error::StoreError;
use crate::store::transaction::{NewTransaction, Transaction, TransactionStatus};
use crate::store::TransactionStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory transaction store.
///
/// The CAS runs under the map's write lock, which gives it the same
/// atomicity the Postgres conditional UPDATE provides. Used by the test
/// suites; not intended for production persistence.
#[derive(Default, Clone)]
pub struct MemoryTransactionStore {
    records: Arc<RwLock<HashMap<Uuid, Transaction>>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, for assertions in tests.
    pub async fn all(&self) -> Vec<Transaction> {
        let records = self.records.read().await;
        let mut all: Vec<Transaction> = records.values().cloned().collect();
        all.sort_by_key(|tx| tx.created_at);
        all
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&new.order_id) {
            return Err(StoreError::DuplicateOrder);
        }

        let now = Utc::now();
        let tx = Transaction {
            order_id: new.order_id,
            tracking_id: None,
            amount: new.amount,
            currency: new.currency,
            description: new.description,
            payer_email: new.payer_email,
            payer_phone: new.payer_phone,
            status: TransactionStatus::Pending,
            owner_reference: new.owner_reference,
            created_at: now,
            updated_at: now,
        };
        records.insert(tx.order_id, tx.clone());
        Ok(tx)
    }

    async fn get_by_order_id(&self, order_id: Uuid) -> Result<Transaction, StoreError> {
        let records = self.records.read().await;
        records.get(&order_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_by_tracking_id(&self, tracking_id: &str) -> Result<Transaction, StoreError> {
        let records = self.records.read().await;
        records
            .values()
            .find(|tx| tx.tracking_id.as_deref() == Some(tracking_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set_tracking_id(&self, order_id: Uuid, tracking_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let tx = records.get_mut(&order_id).ok_or(StoreError::NotFound)?;
        if tx.tracking_id.is_some() {
            return Err(StoreError::TrackingAssigned);
        }
        tx.tracking_id = Some(tracking_id.to_string());
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        order_id: Uuid,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let tx = records.get_mut(&order_id).ok_or(StoreError::NotFound)?;
        if tx.status != expected {
            return Ok(false);
        }
        tx.status = new;
        tx.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_stale_pending(
        &self,
        older_than: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let cutoff = Utc::now() - older_than;
        let records = self.records.read().await;
        let mut stale: Vec<Transaction> = records
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.tracking_id.is_some()
                    && tx.created_at < cutoff
            })
            .cloned()
            .collect();
        stale.sort_by_key(|tx| tx.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn new_transaction(order_id: Uuid) -> NewTransaction {
        NewTransaction {
            order_id,
            amount: BigDecimal::from_str("150.00").unwrap(),
            currency: "KES".to_string(),
            description: "Payment for goods".to_string(),
            payer_email: "payer@example.com".to_string(),
            payer_phone: Some("0712345678".to_string()),
            owner_reference: None,
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let store = MemoryTransactionStore::new();
        let order_id = Uuid::new_v4();
        let created = store.create(new_transaction(order_id)).await.unwrap();
        assert_eq!(created.status, TransactionStatus::Pending);
        assert!(created.tracking_id.is_none());

        let fetched = store.get_by_order_id(order_id).await.unwrap();
        assert_eq!(fetched.order_id, order_id);

        assert!(matches!(
            store.get_by_order_id(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let store = MemoryTransactionStore::new();
        let order_id = Uuid::new_v4();
        store.create(new_transaction(order_id)).await.unwrap();
        assert!(matches!(
            store.create(new_transaction(order_id)).await,
            Err(StoreError::DuplicateOrder)
        ));
    }

    #[tokio::test]
    async fn tracking_id_is_immutable_once_set() {
        let store = MemoryTransactionStore::new();
        let order_id = Uuid::new_v4();
        store.create(new_transaction(order_id)).await.unwrap();

        store.set_tracking_id(order_id, "T1").await.unwrap();
        let tx = store.get_by_tracking_id("T1").await.unwrap();
        assert_eq!(tx.order_id, order_id);

        assert!(matches!(
            store.set_tracking_id(order_id, "T2").await,
            Err(StoreError::TrackingAssigned)
        ));
        let tx = store.get_by_order_id(order_id).await.unwrap();
        assert_eq!(tx.tracking_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn cas_applies_only_on_matching_status() {
        let store = MemoryTransactionStore::new();
        let order_id = Uuid::new_v4();
        store.create(new_transaction(order_id)).await.unwrap();

        let won = store
            .compare_and_set_status(
                order_id,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
            )
            .await
            .unwrap();
        assert!(won);

        // Second attempt sees a terminal status and must be a silent no-op.
        let won = store
            .compare_and_set_status(
                order_id,
                TransactionStatus::Pending,
                TransactionStatus::Failed,
            )
            .await
            .unwrap();
        assert!(!won);

        let tx = store.get_by_order_id(order_id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn cas_bumps_updated_at() {
        let store = MemoryTransactionStore::new();
        let order_id = Uuid::new_v4();
        let created = store.create(new_transaction(order_id)).await.unwrap();

        store
            .compare_and_set_status(
                order_id,
                TransactionStatus::Pending,
                TransactionStatus::Failed,
            )
            .await
            .unwrap();

        let tx = store.get_by_order_id(order_id).await.unwrap();
        assert!(tx.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn stale_pending_requires_tracking_id_and_age() {
        let store = MemoryTransactionStore::new();

        let tracked = Uuid::new_v4();
        store.create(new_transaction(tracked)).await.unwrap();
        store.set_tracking_id(tracked, "T1").await.unwrap();

        // Still awaiting gateway acceptance; not a sweep candidate.
        let untracked = Uuid::new_v4();
        store.create(new_transaction(untracked)).await.unwrap();

        // Already terminal; not a sweep candidate.
        let finished = Uuid::new_v4();
        store.create(new_transaction(finished)).await.unwrap();
        store.set_tracking_id(finished, "T2").await.unwrap();
        store
            .compare_and_set_status(
                finished,
                TransactionStatus::Pending,
                TransactionStatus::Completed,
            )
            .await
            .unwrap();

        let stale = store
            .list_stale_pending(chrono::Duration::zero(), 100)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].order_id, tracked);

        // A cutoff in the past excludes freshly created records.
        let stale = store
            .list_stale_pending(chrono::Duration::minutes(15), 100)
            .await
            .unwrap();
        assert!(stale.is_empty());
    }
}
