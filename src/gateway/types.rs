use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Order submission payload sent to `Transactions/SubmitOrderRequest`.
///
/// Field names follow the Pesapal v3 wire format.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Merchant-generated order id, echoed back by IPNs as
    /// `OrderMerchantReference`.
    pub id: String,
    pub currency: String,
    pub amount: BigDecimal,
    pub description: String,
    pub callback_url: String,
    pub notification_id: String,
    pub billing_address: BillingAddress,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingAddress {
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub country_code: String,
}

/// Successful outcome of an order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub tracking_id: String,
    pub redirect_url: String,
}

/// Result of a `GetTransactionStatus` query.
///
/// `raw_description` is Pesapal's free-text `payment_status_description`;
/// mapping it onto the closed local status set belongs to the reconciler, not
/// to this adapter.
#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub raw_description: String,
    pub confirmation_code: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: Option<String>,
    #[serde(rename = "expiryDate")]
    #[allow(dead_code)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitOrderResponse {
    pub order_tracking_id: Option<String>,
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionStatusResponse {
    pub payment_status_description: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn order_request_serializes_to_pesapal_shape() {
        let order = OrderRequest {
            id: "9f1c1e1a-0000-0000-0000-000000000001".to_string(),
            currency: "KES".to_string(),
            amount: BigDecimal::from_str("150.00").unwrap(),
            description: "Payment for goods".to_string(),
            callback_url: "https://merchant.example/payments/complete".to_string(),
            notification_id: "ipn-id".to_string(),
            billing_address: BillingAddress {
                email_address: "payer@example.com".to_string(),
                phone_number: Some("0712345678".to_string()),
                country_code: "KE".to_string(),
            },
        };

        let json = serde_json::to_value(&order).expect("serialization should succeed");
        assert_eq!(json["currency"], "KES");
        assert_eq!(json["billing_address"]["email_address"], "payer@example.com");
        assert_eq!(json["notification_id"], "ipn-id");
    }

    #[test]
    fn status_response_deserializes_from_json() {
        let payload = serde_json::json!({
            "payment_method": "MpesaKE",
            "amount": 150.0,
            "created_date": "2026-02-12T00:00:00Z",
            "confirmation_code": "ABC123XYZ",
            "payment_status_description": "Completed",
            "merchant_reference": "9f1c1e1a-0000-0000-0000-000000000001"
        });
        let parsed: TransactionStatusResponse =
            serde_json::from_value(payload).expect("deserialization should succeed");
        assert_eq!(parsed.payment_status_description.as_deref(), Some("Completed"));
        assert_eq!(parsed.confirmation_code.as_deref(), Some("ABC123XYZ"));
    }
}
