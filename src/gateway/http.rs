use crate::gateway::error::{GatewayError, GatewayResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Thin JSON-over-HTTP client for the gateway with bounded retries.
///
/// Retries only server errors and rate limits; 4xx responses are surfaced
/// immediately since resending the same request cannot help.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> GatewayResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| GatewayError::Network {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
    ) -> GatewayResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);
            request = request.header("Accept", "application/json");

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| GatewayError::Network {
                message: if e.is_timeout() {
                    format!("gateway request timed out after {:?}", self.timeout)
                } else {
                    format!("gateway request failed: {}", e)
                },
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            GatewayError::MalformedResponse {
                                message: format!("invalid gateway JSON response: {}", e),
                            }
                        });
                    }

                    if (status.is_server_error() || status.as_u16() == 429)
                        && attempt < self.max_retries
                    {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(GatewayError::Provider {
                        message: format!("HTTP {}: {}", status, text),
                        status_code: Some(status.as_u16()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::Network {
            message: "gateway request failed".to_string(),
        }))
    }
}
