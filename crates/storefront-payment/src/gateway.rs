//! # Payment Gateway Boundary
//!
//! ```text
//! PaymentService ──► dyn PaymentGateway ──┬── ZarinpalGateway (HTTP)
//!                                         └── MockGateway     (scripted)
//! ```
//!
//! Amounts crossing this boundary are already in gateway units.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storefront_core::Money;

use crate::error::GatewayError;

/// Outcome of a verify call that reached the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    /// True only when the gateway confirmed the payment.
    pub verified: bool,
    pub ref_id: Option<String>,
    pub code: Option<i64>,
    /// Payload as received, kept for audit.
    pub raw_response: serde_json::Value,
}

impl Verification {
    pub fn raw_string(&self) -> String {
        self.raw_response.to_string()
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the gateway for an authority token for `amount`.
    async fn request_payment(&self, amount: Money, description: &str) -> Result<String, GatewayError>;

    /// Asks the gateway whether the payment for `authority` went through.
    async fn verify_payment(&self, amount: Money, authority: &str) -> Result<Verification, GatewayError>;

    /// Where to send the user's browser to pay.
    fn redirect_url(&self, authority: &str) -> String;
}
