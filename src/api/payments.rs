use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::{AppState, AuthenticatedUser};
use crate::error::AppError;
use crate::services::InitiationRequest;
use crate::store::TransactionStatus;

#[derive(Debug, Deserialize)]
pub struct InitiateBody {
    pub amount: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub order_tracking_id: String,
    pub redirect_url: String,
}

/// POST /payments/initiate
pub async fn initiate(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<InitiateBody>,
) -> Result<Json<InitiateResponse>, AppError> {
    info!(email = %user.email, "payment initiation requested");

    let initiated = state
        .initiation
        .initiate(InitiationRequest {
            amount: body.amount,
            payer_email: user.email,
            payer_phone: body.phone_number,
            owner_reference: user.user_id,
        })
        .await?;

    Ok(Json(InitiateResponse {
        order_tracking_id: initiated.tracking_id,
        redirect_url: initiated.redirect_url,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub order_id: Uuid,
    pub order_tracking_id: String,
    pub status: TransactionStatus,
    pub updated_at: DateTime<Utc>,
}

/// GET /payments/status/{order_tracking_id}
///
/// Re-checks the gateway inline while the local record is non-terminal, so a
/// payer polling right after checkout sees the settled state as soon as the
/// gateway reports it.
pub async fn status(
    State(state): State<AppState>,
    Path(order_tracking_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let tx = state
        .callbacks
        .refresh_by_tracking_id(&order_tracking_id)
        .await?;

    Ok(Json(StatusResponse {
        order_id: tx.order_id,
        order_tracking_id,
        status: tx.status,
        updated_at: tx.updated_at,
    }))
}
