use crate::config::PesapalConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::GatewayHttpClient;
use crate::gateway::types::{
    GatewayStatus, OrderRequest, SubmitOrderResponse, SubmittedOrder, TokenResponse,
    TransactionStatusResponse,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Outbound seam to the payment gateway.
///
/// Production uses [`PesapalClient`]; tests substitute scripted
/// implementations.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn submit_order(&self, order: &OrderRequest) -> GatewayResult<SubmittedOrder>;

    async fn query_status(&self, tracking_id: &str) -> GatewayResult<GatewayStatus>;
}

/// Pesapal issues tokens with a five-minute validity; cache slightly below
/// that so a token is never presented right at its expiry edge.
const TOKEN_TTL: Duration = Duration::from_secs(240);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    acquired_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= TOKEN_TTL
    }
}

/// HTTP client for the Pesapal v3 API.
///
/// Token caching is an optimization only: every call path re-acquires a
/// credential when the cache is empty, expired, or rejected by the gateway.
pub struct PesapalClient {
    config: PesapalConfig,
    http: GatewayHttpClient,
    token: RwLock<Option<CachedToken>>,
}

impl PesapalClient {
    pub fn new(config: PesapalConfig) -> GatewayResult<Self> {
        let http = GatewayHttpClient::new(
            Duration::from_secs(config.request_timeout),
            config.max_retries,
        )?;
        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn acquire_token(&self) -> GatewayResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(entry) = cached.as_ref() {
                if !entry.is_expired() {
                    return Ok(entry.token.clone());
                }
            }
        }

        let token = self.request_token().await?;
        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            token: token.clone(),
            acquired_at: Instant::now(),
        });
        Ok(token)
    }

    async fn invalidate_token(&self) {
        let mut cached = self.token.write().await;
        *cached = None;
    }

    async fn request_token(&self) -> GatewayResult<String> {
        let payload = serde_json::json!({
            "consumer_key": self.config.consumer_key,
            "consumer_secret": self.config.consumer_secret,
        });

        let raw: TokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/Auth/RequestToken"),
                None,
                Some(&payload),
            )
            .await
            .map_err(|e| match e {
                // A rejected credential request is an auth failure, whatever
                // status code carried it.
                GatewayError::Provider { message, .. } => GatewayError::Auth { message },
                other => other,
            })?;

        match raw.token {
            Some(token) if !token.is_empty() => {
                debug!("acquired pesapal bearer token");
                Ok(token)
            }
            _ => Err(GatewayError::Auth {
                message: format!(
                    "token endpoint returned no token: {}",
                    raw.error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no error detail".to_string())
                ),
            }),
        }
    }

    /// Issue a bearer-authenticated request, refreshing the token once if the
    /// gateway reports the cached one as no longer valid.
    async fn authorized<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&JsonValue>,
    ) -> GatewayResult<T> {
        let token = self.acquire_token().await?;
        match self
            .http
            .request_json(method.clone(), url, Some(&token), body)
            .await
        {
            Err(GatewayError::Provider {
                status_code: Some(401),
                ..
            }) => {
                self.invalidate_token().await;
                let token = self.acquire_token().await?;
                self.http.request_json(method, url, Some(&token), body).await
            }
            other => other,
        }
    }

    pub(crate) fn parse_submit_response(
        raw: SubmitOrderResponse,
    ) -> GatewayResult<SubmittedOrder> {
        if let Some(error) = raw.error.filter(|e| !e.is_null()) {
            return Err(GatewayError::Provider {
                message: error.to_string(),
                status_code: None,
                retryable: false,
            });
        }

        match (raw.order_tracking_id, raw.redirect_url) {
            (Some(tracking_id), Some(redirect_url))
                if !tracking_id.is_empty() && !redirect_url.is_empty() =>
            {
                Ok(SubmittedOrder {
                    tracking_id,
                    redirect_url,
                })
            }
            _ => Err(GatewayError::MalformedResponse {
                message: "order response missing order_tracking_id or redirect_url".to_string(),
            }),
        }
    }

    pub(crate) fn parse_status_response(
        raw: TransactionStatusResponse,
    ) -> GatewayResult<GatewayStatus> {
        if let Some(error) = raw.error.filter(|e| !e.is_null()) {
            return Err(GatewayError::Provider {
                message: error.to_string(),
                status_code: None,
                retryable: false,
            });
        }

        match raw.payment_status_description {
            Some(raw_description) => Ok(GatewayStatus {
                raw_description,
                confirmation_code: raw.confirmation_code,
                payment_method: raw.payment_method,
            }),
            None => Err(GatewayError::MalformedResponse {
                message: "status response missing payment_status_description".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GatewayApi for PesapalClient {
    async fn submit_order(&self, order: &OrderRequest) -> GatewayResult<SubmittedOrder> {
        let payload =
            serde_json::to_value(order).map_err(|e| GatewayError::MalformedResponse {
                message: format!("failed to encode order payload: {}", e),
            })?;

        let raw: SubmitOrderResponse = self
            .authorized(
                reqwest::Method::POST,
                &self.endpoint("/api/Transactions/SubmitOrderRequest"),
                Some(&payload),
            )
            .await?;

        let submitted = Self::parse_submit_response(raw)?;
        info!(
            merchant_reference = %order.id,
            tracking_id = %submitted.tracking_id,
            "pesapal order submitted"
        );
        Ok(submitted)
    }

    async fn query_status(&self, tracking_id: &str) -> GatewayResult<GatewayStatus> {
        let url = format!(
            "{}?orderTrackingId={}",
            self.endpoint("/api/Transactions/GetTransactionStatus"),
            tracking_id
        );

        let raw: TransactionStatusResponse =
            self.authorized(reqwest::Method::GET, &url, None).await?;

        Self::parse_status_response(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_requires_tracking_and_redirect() {
        let ok = SubmitOrderResponse {
            order_tracking_id: Some("b945e4af-80a5-4ec1-8706-e03f8332fb04".to_string()),
            redirect_url: Some("https://cybqa.pesapal.com/pesapaliframe/x".to_string()),
            error: None,
        };
        let parsed = PesapalClient::parse_submit_response(ok).expect("should parse");
        assert_eq!(parsed.tracking_id, "b945e4af-80a5-4ec1-8706-e03f8332fb04");

        let missing = SubmitOrderResponse {
            order_tracking_id: None,
            redirect_url: Some("https://cybqa.pesapal.com/pesapaliframe/x".to_string()),
            error: None,
        };
        assert!(matches!(
            PesapalClient::parse_submit_response(missing),
            Err(GatewayError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn submit_response_surfaces_gateway_error_object() {
        let rejected = SubmitOrderResponse {
            order_tracking_id: None,
            redirect_url: None,
            error: Some(serde_json::json!({
                "code": "invalid_currency",
                "message": "Currency not supported"
            })),
        };
        match PesapalClient::parse_submit_response(rejected) {
            Err(GatewayError::Provider { message, retryable, .. }) => {
                assert!(message.contains("invalid_currency"));
                assert!(!retryable);
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn status_response_requires_description() {
        let ok = TransactionStatusResponse {
            payment_status_description: Some("Completed".to_string()),
            confirmation_code: Some("ABC123".to_string()),
            payment_method: Some("MpesaKE".to_string()),
            error: None,
        };
        let parsed = PesapalClient::parse_status_response(ok).expect("should parse");
        assert_eq!(parsed.raw_description, "Completed");

        let missing = TransactionStatusResponse {
            payment_status_description: None,
            confirmation_code: None,
            payment_method: None,
            error: None,
        };
        assert!(matches!(
            PesapalClient::parse_status_response(missing),
            Err(GatewayError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn cached_token_expiry() {
        let fresh = CachedToken {
            token: "t".to_string(),
            acquired_at: Instant::now(),
        };
        assert!(!fresh.is_expired());

        let stale = CachedToken {
            token: "t".to_string(),
            acquired_at: Instant::now() - TOKEN_TTL,
        };
        assert!(stale.is_expired());
    }
}
