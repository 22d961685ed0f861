use crate::error::AppError;
use crate::gateway::GatewayApi;
use crate::services::reconciler::{ReconcileOutcome, StatusReconciler};
use crate::store::{Transaction, TransactionStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Acknowledgement returned for a processed-or-no-op callback.
#[derive(Debug, Clone)]
pub struct CallbackAck {
    pub order_id: Uuid,
    pub outcome: ReconcileOutcome,
}

/// Processes Pesapal IPN callbacks and inline status refreshes.
///
/// The webhook payload is treated as a hint only: the authoritative status is
/// always re-queried from the gateway before anything is written.
pub struct CallbackProcessor {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn GatewayApi>,
    reconciler: Arc<StatusReconciler>,
}

impl CallbackProcessor {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn GatewayApi>,
        reconciler: Arc<StatusReconciler>,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        tracking_id: Option<&str>,
        merchant_reference: Option<&str>,
    ) -> Result<CallbackAck, AppError> {
        let tracking_id = require_field(tracking_id, "OrderTrackingId")?;
        let merchant_reference = require_field(merchant_reference, "OrderMerchantReference")?;

        let order_id = Uuid::parse_str(merchant_reference)
            .map_err(|_| AppError::NotFound("unknown merchant reference".to_string()))?;
        let tx = self.store.get_by_order_id(order_id).await?;

        let outcome = self.reconcile_against_gateway(&tx, tracking_id).await?;

        info!(
            order_id = %order_id,
            tracking_id = tracking_id,
            outcome = ?outcome,
            "callback processed"
        );

        Ok(CallbackAck { order_id, outcome })
    }

    /// Inline refresh for the status endpoint: while the local record is
    /// non-terminal, re-check the gateway before answering.
    pub async fn refresh_by_tracking_id(
        &self,
        tracking_id: &str,
    ) -> Result<Transaction, AppError> {
        let tx = self.store.get_by_tracking_id(tracking_id).await?;

        if tx.status.is_terminal() {
            return Ok(tx);
        }

        self.reconcile_against_gateway(&tx, tracking_id).await?;
        Ok(self.store.get_by_order_id(tx.order_id).await?)
    }

    async fn reconcile_against_gateway(
        &self,
        tx: &Transaction,
        tracking_id: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let status = self.gateway.query_status(tracking_id).await?;
        let outcome = self.reconciler.reconcile(tx, &status.raw_description).await?;
        Ok(outcome)
    }
}

fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
}
