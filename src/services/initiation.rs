use crate::config::PesapalConfig;
use crate::error::AppError;
use crate::gateway::{BillingAddress, GatewayApi, OrderRequest};
use crate::store::{NewTransaction, TransactionStatus, TransactionStore};
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Input for starting a payment.
#[derive(Debug, Clone)]
pub struct InitiationRequest {
    pub amount: Option<String>,
    pub payer_email: String,
    pub payer_phone: Option<String>,
    pub owner_reference: Option<String>,
}

/// Outcome handed back to the caller for redirecting the payer.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub order_id: Uuid,
    pub tracking_id: String,
    pub redirect_url: String,
}

/// Creates the transaction record and submits the order to the gateway.
pub struct InitiationService {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn GatewayApi>,
    config: PesapalConfig,
}

impl InitiationService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn GatewayApi>,
        config: PesapalConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    pub async fn initiate(&self, request: InitiationRequest) -> Result<InitiatedPayment, AppError> {
        let amount = parse_amount(request.amount.as_deref())?;

        let order_id = Uuid::new_v4();
        self.store
            .create(NewTransaction {
                order_id,
                amount: amount.clone(),
                currency: self.config.currency.clone(),
                description: self.config.description.clone(),
                payer_email: request.payer_email.clone(),
                payer_phone: request.payer_phone.clone(),
                owner_reference: request.owner_reference,
            })
            .await?;

        let order = OrderRequest {
            id: order_id.to_string(),
            currency: self.config.currency.clone(),
            amount,
            description: self.config.description.clone(),
            callback_url: self.config.callback_url.clone(),
            notification_id: self.config.notification_id.clone(),
            billing_address: BillingAddress {
                email_address: request.payer_email,
                phone_number: request.payer_phone,
                country_code: self.config.country_code.clone(),
            },
        };

        match self.gateway.submit_order(&order).await {
            Ok(submitted) => {
                // Sole writer here: reconciliation cannot have started before
                // a tracking id exists.
                self.store
                    .set_tracking_id(order_id, &submitted.tracking_id)
                    .await?;

                info!(
                    order_id = %order_id,
                    tracking_id = %submitted.tracking_id,
                    "payment initiated"
                );

                Ok(InitiatedPayment {
                    order_id,
                    tracking_id: submitted.tracking_id,
                    redirect_url: submitted.redirect_url,
                })
            }
            Err(gateway_err) => {
                warn!(
                    order_id = %order_id,
                    error = %gateway_err,
                    "gateway rejected order submission, failing transaction"
                );
                // No tracking id was ever assigned, so nothing can be polling
                // this record; fail it directly without the reconciler.
                if let Err(store_err) = self
                    .store
                    .compare_and_set_status(
                        order_id,
                        TransactionStatus::Pending,
                        TransactionStatus::Failed,
                    )
                    .await
                {
                    error!(
                        order_id = %order_id,
                        error = %store_err,
                        "failed to mark transaction as failed after gateway error"
                    );
                }
                Err(AppError::Gateway(gateway_err))
            }
        }
    }
}

fn parse_amount(raw: Option<&str>) -> Result<BigDecimal, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation("Amount is required".to_string()))?;

    let amount = BigDecimal::from_str(raw)
        .map_err(|_| AppError::Validation(format!("invalid decimal amount: {}", raw)))?;

    if amount <= BigDecimal::from(0) {
        return Err(AppError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }

    Ok(amount)
}
