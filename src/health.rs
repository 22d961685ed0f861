//! Health check module
//! Provides health status for the application and its database dependency

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub database: ComponentHealth,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub up: bool,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

pub fn router(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(pool)
}

async fn health_handler(State(pool): State<PgPool>) -> (StatusCode, Json<HealthStatus>) {
    let database = check_database(&pool).await;
    let healthy = database.up;

    let status = HealthStatus {
        status: if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        },
        database,
        timestamp: chrono::Utc::now(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn check_database(pool: &PgPool) -> ComponentHealth {
    let start = Instant::now();
    match timeout(
        Duration::from_secs(5),
        sqlx::query("SELECT 1").fetch_one(pool),
    )
    .await
    {
        Ok(Ok(_)) => ComponentHealth {
            up: true,
            response_time_ms: Some(start.elapsed().as_millis()),
            details: None,
        },
        Ok(Err(e)) => {
            warn!(error = %e, "database health check failed");
            ComponentHealth {
                up: false,
                response_time_ms: None,
                details: Some(e.to_string()),
            }
        }
        Err(_) => {
            warn!("database health check timed out");
            ComponentHealth {
                up: false,
                response_time_ms: None,
                details: Some("health check timed out".to_string()),
            }
        }
    }
}
