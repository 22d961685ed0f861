//! HTTP surface: payment initiation, the Pesapal IPN callback and status
//! queries.

pub mod payments;
pub mod webhooks;

use crate::error::AppError;
use crate::services::{CallbackProcessor, InitiationService};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub initiation: Arc<InitiationService>,
    pub callbacks: Arc<CallbackProcessor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/payments/initiate", post(payments::initiate))
        .route(
            "/payments/callback",
            get(webhooks::handle_callback_query).post(webhooks::handle_callback_json),
        )
        .route(
            "/payments/status/{order_tracking_id}",
            get(payments::status),
        )
        .with_state(state)
}

/// Caller identity forwarded by the upstream auth layer.
///
/// Authentication itself is an external collaborator; this extractor only
/// consumes the headers it sets.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub email: String,
    pub user_id: Option<String>,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?
            .to_string();

        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(AuthenticatedUser { email, user_id })
    }
}
