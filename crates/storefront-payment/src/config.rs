//! Gateway configuration, read from the `[gateway]` table of the service
//! config file.

use serde::Deserialize;
use std::time::Duration;

pub const SANDBOX_REQUEST_URL: &str = "https://sandbox.zarinpal.com/pg/v4/payment/request.json";
pub const SANDBOX_VERIFY_URL: &str = "https://sandbox.zarinpal.com/pg/v4/payment/verify.json";
pub const SANDBOX_START_PAY_URL: &str = "https://sandbox.zarinpal.com/pg/StartPay/{authority}";

/// Zarinpal connection settings.
///
/// ## Example
/// ```toml
/// [gateway]
/// merchant_id = "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
/// callback_url = "https://shop.example/payments/verify"
/// timeout_secs = 15
/// amount_multiplier = 10
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub request_url: String,
    pub verify_url: String,
    /// Must contain `{authority}`.
    pub start_pay_url: String,
    pub callback_url: String,
    /// Upper bound on every gateway call.
    pub timeout_secs: u64,
    /// Order total → gateway amount (toman → rial is 10).
    pub amount_multiplier: i64,
    pub sandbox: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            merchant_id: String::new(),
            request_url: SANDBOX_REQUEST_URL.to_string(),
            verify_url: SANDBOX_VERIFY_URL.to_string(),
            start_pay_url: SANDBOX_START_PAY_URL.to_string(),
            callback_url: "http://127.0.0.1:8080/payments/verify".to_string(),
            timeout_secs: 15,
            amount_multiplier: 10,
            sandbox: true,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Points every gateway URL at `base` (a mock server in tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.request_url = format!("{base}/pg/v4/payment/request.json");
        self.verify_url = format!("{base}/pg/v4/payment/verify.json");
        self.start_pay_url = format!("{base}/pg/StartPay/{{authority}}");
        self
    }

    /// Returns a description of the first problem found, if any.
    pub fn problem(&self) -> Option<String> {
        if self.merchant_id.trim().is_empty() {
            return Some("gateway.merchant_id is required".to_string());
        }
        if !self.start_pay_url.contains("{authority}") {
            return Some("gateway.start_pay_url must contain {authority}".to_string());
        }
        if self.timeout_secs == 0 {
            return Some("gateway.timeout_secs must be positive".to_string());
        }
        if self.amount_multiplier < 1 {
            return Some("gateway.amount_multiplier must be at least 1".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.amount_multiplier, 10);
        assert_eq!(config.problem().as_deref(), Some("gateway.merchant_id is required"));
    }

    #[test]
    fn test_with_base_url() {
        let config = GatewayConfig {
            merchant_id: "m".into(),
            ..GatewayConfig::default()
        }
        .with_base_url("http://127.0.0.1:9999/");

        assert_eq!(config.verify_url, "http://127.0.0.1:9999/pg/v4/payment/verify.json");
        assert_eq!(config.start_pay_url, "http://127.0.0.1:9999/pg/StartPay/{authority}");
        assert!(config.problem().is_none());
    }
}
