use crate::services::notification::EventSink;
use crate::store::{StoreError, Transaction, TransactionStatus, TransactionStore};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result of a reconciliation attempt.
///
/// Transition detection is an explicit return value rather than a write hook:
/// the caller that receives `Transitioned` is the one writer whose CAS won,
/// and only that writer's call has fired the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Transitioned(TransactionStatus),
    NoChange,
}

/// The state machine core.
///
/// Given a transaction and a freshly observed gateway status description,
/// decides whether to advance the record. Safe to invoke any number of times
/// from any number of concurrent callers: repeated or racing calls collapse
/// into at most one committed transition per record.
pub struct StatusReconciler {
    store: Arc<dyn TransactionStore>,
    sink: Arc<dyn EventSink>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn TransactionStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    /// Reconcile `tx` against the gateway-reported `raw_description`.
    ///
    /// Never retries; a lost CAS means another writer already settled the
    /// record and its transition is authoritative. Store failures other than
    /// a CAS mismatch propagate to the caller.
    pub async fn reconcile(
        &self,
        tx: &Transaction,
        raw_description: &str,
    ) -> Result<ReconcileOutcome, StoreError> {
        let Some(target) = TransactionStatus::from_gateway_description(raw_description) else {
            debug!(
                order_id = %tx.order_id,
                description = raw_description,
                "gateway reported a non-terminal status, leaving record untouched"
            );
            return Ok(ReconcileOutcome::NoChange);
        };

        if tx.status.is_terminal() {
            debug!(
                order_id = %tx.order_id,
                status = %tx.status,
                "transaction already terminal, nothing to reconcile"
            );
            return Ok(ReconcileOutcome::NoChange);
        }

        let won = self
            .store
            .compare_and_set_status(tx.order_id, TransactionStatus::Pending, target)
            .await?;

        if !won {
            info!(
                order_id = %tx.order_id,
                attempted = %target,
                "concurrent writer already transitioned this transaction"
            );
            return Ok(ReconcileOutcome::NoChange);
        }

        info!(
            order_id = %tx.order_id,
            tracking_id = tx.tracking_id.as_deref().unwrap_or(""),
            status = %target,
            "transaction transitioned"
        );

        if target == TransactionStatus::Completed {
            // The enqueue rides on the won CAS; losing it here loses the
            // notification, never the transition.
            if let Err(e) = self.sink.transaction_completed(tx).await {
                error!(
                    order_id = %tx.order_id,
                    error = %e,
                    "failed to enqueue completion notification"
                );
            }
        }

        Ok(ReconcileOutcome::Transitioned(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTransactionStore, NewTransaction};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingSink {
        fired: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                fired: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.fired.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EventSink for CountingSink {
        async fn transaction_completed(&self, _tx: &Transaction) -> Result<(), StoreError> {
            self.fired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn pending_transaction(
        store: &MemoryTransactionStore,
        tracking_id: &str,
    ) -> Transaction {
        let order_id = Uuid::new_v4();
        store
            .create(NewTransaction {
                order_id,
                amount: BigDecimal::from_str("150.00").unwrap(),
                currency: "KES".to_string(),
                description: "Payment for goods".to_string(),
                payer_email: "payer@example.com".to_string(),
                payer_phone: None,
                owner_reference: None,
            })
            .await
            .unwrap();
        store.set_tracking_id(order_id, tracking_id).await.unwrap();
        store.get_by_order_id(order_id).await.unwrap()
    }

    fn reconciler(
        store: &MemoryTransactionStore,
    ) -> (StatusReconciler, Arc<CountingSink>) {
        let sink = Arc::new(CountingSink::new());
        let reconciler = StatusReconciler::new(Arc::new(store.clone()), sink.clone());
        (reconciler, sink)
    }

    #[tokio::test]
    async fn completed_transition_fires_sink_once() {
        let store = MemoryTransactionStore::new();
        let (reconciler, sink) = reconciler(&store);
        let tx = pending_transaction(&store, "T1").await;

        let outcome = reconciler.reconcile(&tx, "Completed").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Transitioned(TransactionStatus::Completed)
        );
        assert_eq!(sink.count(), 1);

        let stored = store.get_by_order_id(tx.order_id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn repeated_reconciliation_is_idempotent() {
        let store = MemoryTransactionStore::new();
        let (reconciler, sink) = reconciler(&store);
        let tx = pending_transaction(&store, "T1").await;

        reconciler.reconcile(&tx, "Completed").await.unwrap();

        // Replay with both the stale and the fresh view of the record.
        let outcome = reconciler.reconcile(&tx, "Completed").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NoChange);

        let fresh = store.get_by_order_id(tx.order_id).await.unwrap();
        let outcome = reconciler.reconcile(&fresh, "Completed").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NoChange);

        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn terminal_status_never_moves_backwards() {
        let store = MemoryTransactionStore::new();
        let (reconciler, sink) = reconciler(&store);
        let tx = pending_transaction(&store, "T1").await;

        reconciler.reconcile(&tx, "Cancelled").await.unwrap();
        assert_eq!(sink.count(), 0);

        let fresh = store.get_by_order_id(tx.order_id).await.unwrap();
        for description in ["Completed", "Failed", "Cancelled", "Invalid"] {
            let outcome = reconciler.reconcile(&fresh, description).await.unwrap();
            assert_eq!(outcome, ReconcileOutcome::NoChange);
        }

        let stored = store.get_by_order_id(tx.order_id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Cancelled);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn unknown_description_leaves_record_untouched() {
        let store = MemoryTransactionStore::new();
        let (reconciler, sink) = reconciler(&store);
        let tx = pending_transaction(&store, "T1").await;

        for description in ["Invalid", "", "Pending", "something-new"] {
            let outcome = reconciler.reconcile(&tx, description).await.unwrap();
            assert_eq!(outcome, ReconcileOutcome::NoChange);
        }

        let stored = store.get_by_order_id(tx.order_id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn racing_reconcilers_produce_one_winner() {
        let store = MemoryTransactionStore::new();
        let (reconciler, sink) = reconciler(&store);
        let reconciler = Arc::new(reconciler);
        let tx = pending_transaction(&store, "T1").await;

        // Both callers hold the same PENDING snapshot, as a webhook and a
        // sweep iteration would when they race on one record.
        let (a, b) = tokio::join!(
            reconciler.reconcile(&tx, "Completed"),
            reconciler.reconcile(&tx, "Failed"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let transitions: Vec<_> = [a, b]
            .into_iter()
            .filter_map(|outcome| match outcome {
                ReconcileOutcome::Transitioned(status) => Some(status),
                ReconcileOutcome::NoChange => None,
            })
            .collect();
        assert_eq!(transitions.len(), 1, "exactly one CAS may win");

        let stored = store.get_by_order_id(tx.order_id).await.unwrap();
        assert_eq!(stored.status, transitions[0]);

        let expected_fires = usize::from(transitions[0] == TransactionStatus::Completed);
        assert_eq!(sink.count(), expected_fires);
    }
}
