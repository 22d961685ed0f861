use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures from the Pesapal gateway, collapsed into one discriminated type so
/// that transport detail never leaks into callers.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway authentication failed: {message}")]
    Auth { message: String },

    #[error("Gateway request failed: {message}")]
    Network { message: String },

    #[error("Gateway rejected the request: {message}")]
    Provider {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Malformed gateway response: {message}")]
    MalformedResponse { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Auth { .. } => false,
            GatewayError::Network { .. } => true,
            GatewayError::Provider { retryable, .. } => *retryable,
            GatewayError::MalformedResponse { .. } => false,
        }
    }
}
