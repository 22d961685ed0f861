//! Outbound adapter for the Pesapal payment gateway.
//!
//! Pure I/O: token acquisition, order submission and status queries. No
//! state-transition logic lives here.

pub mod client;
pub mod error;
mod http;
pub mod types;

pub use client::{GatewayApi, PesapalClient};
pub use error::{GatewayError, GatewayResult};
pub use types::{BillingAddress, GatewayStatus, OrderRequest, SubmittedOrder};
