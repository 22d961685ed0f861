//! Durable keyed storage for transaction records.
//!
//! The status column is only ever advanced through
//! [`TransactionStore::compare_and_set_status`]; that single atomic
//! conditional write is what keeps racing webhook and sweep reconciliations
//! from losing updates.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod transaction;

pub use error::StoreError;
pub use memory::MemoryTransactionStore;
pub use postgres::PgTransactionStore;
pub use transaction::{NewTransaction, Transaction, TransactionStatus};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error as log_error, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a fresh PENDING record. Fails with
    /// [`StoreError::DuplicateOrder`] if the order id already exists.
    async fn create(&self, new: NewTransaction) -> Result<Transaction, StoreError>;

    async fn get_by_order_id(&self, order_id: Uuid) -> Result<Transaction, StoreError>;

    async fn get_by_tracking_id(&self, tracking_id: &str) -> Result<Transaction, StoreError>;

    /// Record the gateway-assigned tracking id. Applies only while the stored
    /// tracking id is still null; [`StoreError::TrackingAssigned`] otherwise.
    async fn set_tracking_id(&self, order_id: Uuid, tracking_id: &str) -> Result<(), StoreError>;

    /// Atomically advance `status` from `expected` to `new`.
    ///
    /// Returns `Ok(false)` without touching the record when the stored status
    /// no longer equals `expected`: the caller lost the race and the other
    /// writer's transition stands.
    async fn compare_and_set_status(
        &self,
        order_id: Uuid,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, StoreError>;

    /// PENDING records that already have a tracking id and were created more
    /// than `older_than` ago, i.e. candidates whose webhook may never arrive.
    async fn list_stale_pending(
        &self,
        older_than: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<Transaction>, StoreError>;
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, StoreError> {
    let config = config.unwrap_or_default();

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            StoreError::from_sqlx(e)
        })?;

    // Test the connection
    pool.acquire().await.map_err(|e| {
        log_error!("Failed to acquire test connection: {}", e);
        StoreError::from_sqlx(e)
    })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Initialize the database pool from application configuration
pub async fn init_pool_from_config(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool_config = PoolConfig {
        max_connections: config.max_connections,
        min_connections: config.min_connections,
        connection_timeout: Duration::from_secs(config.connection_timeout),
        idle_timeout: Duration::from_secs(config.idle_timeout.unwrap_or(600)),
        max_lifetime: Duration::from_secs(1800),
    };

    init_pool(&config.url, Some(pool_config)).await
}
