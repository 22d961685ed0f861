use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle state of a payment transaction.
///
/// `Pending` is the only non-terminal state; every edge out of it leads to a
/// terminal state and there are no edges back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Map Pesapal's `payment_status_description` onto the local status set.
    ///
    /// Anything outside the fixed table (interim states like "Invalid" or
    /// "Reversed", empty strings, future additions) maps to `None`: the
    /// gateway has not reported a terminal outcome yet and the record must
    /// stay untouched.
    pub fn from_gateway_description(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Completed" => Some(TransactionStatus::Completed),
            "Failed" => Some(TransactionStatus::Failed),
            "Cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// A payment transaction as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub order_id: Uuid,
    /// Pesapal's OrderTrackingId; null until the gateway accepts the order,
    /// immutable afterwards.
    pub tracking_id: Option<String>,
    pub amount: BigDecimal,
    pub currency: String,
    pub description: String,
    pub payer_email: String,
    pub payer_phone: Option<String>,
    pub status: TransactionStatus,
    /// Weak reference to an external user identity; informational only.
    pub owner_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a transaction record; status, tracking id and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub description: String,
    pub payer_email: String,
    pub payer_phone: Option<String>,
    pub owner_reference: Option<String>,
}
