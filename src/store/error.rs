use thiserror::Error;

/// Persistence failures.
///
/// A CAS status mismatch is deliberately NOT represented here; it is a normal
/// `Ok(false)` outcome of `compare_and_set_status`, not an error.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("transaction not found")]
    NotFound,

    #[error("order id already exists")]
    DuplicateOrder,

    #[error("tracking id already assigned")]
    TrackingAssigned,

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateOrder,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}
