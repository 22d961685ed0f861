use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::error::AppError;

/// IPN parameters as Pesapal sends them. Pesapal delivers IPNs as GETs with
/// query parameters by default but can be configured for POST with a JSON
/// body; both carry the same fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "OrderTrackingId")]
    pub order_tracking_id: Option<String>,
    #[serde(rename = "OrderMerchantReference")]
    pub order_merchant_reference: Option<String>,
    #[serde(rename = "OrderNotificationType", default)]
    pub order_notification_type: Option<String>,
}

/// Ack shape Pesapal expects back from an IPN endpoint.
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    #[serde(rename = "orderNotificationType")]
    pub order_notification_type: String,
    #[serde(rename = "orderTrackingId")]
    pub order_tracking_id: String,
    #[serde(rename = "orderMerchantReference")]
    pub order_merchant_reference: String,
    pub status: u16,
}

/// GET /payments/callback
pub async fn handle_callback_query(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, AppError> {
    process(state, params).await
}

/// POST /payments/callback
pub async fn handle_callback_json(
    State(state): State<AppState>,
    Json(params): Json<CallbackParams>,
) -> Result<Json<CallbackResponse>, AppError> {
    process(state, params).await
}

async fn process(
    state: AppState,
    params: CallbackParams,
) -> Result<Json<CallbackResponse>, AppError> {
    info!(
        tracking_id = params.order_tracking_id.as_deref().unwrap_or(""),
        merchant_reference = params.order_merchant_reference.as_deref().unwrap_or(""),
        "received pesapal IPN"
    );

    let ack = state
        .callbacks
        .handle(
            params.order_tracking_id.as_deref(),
            params.order_merchant_reference.as_deref(),
        )
        .await?;

    Ok(Json(CallbackResponse {
        order_notification_type: params
            .order_notification_type
            .unwrap_or_else(|| "IPNCHANGE".to_string()),
        order_tracking_id: params.order_tracking_id.unwrap_or_default(),
        order_merchant_reference: ack.order_id.to_string(),
        status: 200,
    }))
}
