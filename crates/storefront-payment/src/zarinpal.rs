//! # Zarinpal Gateway Client
//!
//! Zarinpal v4 JSON API.
//!
//! ## Wire Format
//! ```text
//! POST request.json  { merchant_id, amount, callback_url, description }
//!   ← { "data": { "code": 100, "authority": "A000..." }, "errors": [] }
//!
//! POST verify.json   { merchant_id, amount, authority }
//!   ← { "data": { "code": 100 | 101, "ref_id": 201 }, "errors": [] }
//!
//! On failure `data` is empty and `errors` is an object:
//!   ← { "data": [], "errors": { "code": -9, "message": "..." } }
//! ```
//!
//! Code 101 means "already verified". Verification is idempotent on the
//! gateway side, so 101 counts as success.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use storefront_core::Money;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, Verification};

/// Payment accepted.
pub const CODE_OK: i64 = 100;
/// Payment was already verified by an earlier call.
pub const CODE_ALREADY_VERIFIED: i64 = 101;

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    callback_url: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    authority: &'a str,
}

/// HTTP client for Zarinpal.
#[derive(Debug, Clone)]
pub struct ZarinpalGateway {
    config: GatewayConfig,
    http: Client,
}

impl ZarinpalGateway {
    /// Builds a client whose every call is bounded by `config.timeout()`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(ZarinpalGateway { config, http })
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value, GatewayError> {
        let response = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), body = %text, "Gateway returned non-success status");
            return Err(GatewayError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

/// `errors` is `[]` on success and a non-empty object on failure.
fn has_errors(body: &Value) -> bool {
    match body.get("errors") {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(list)) => !list.is_empty(),
        _ => false,
    }
}

fn error_code(body: &Value) -> (i64, String) {
    let errors = body.get("errors");
    let code = errors
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let message = errors
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    (code, message)
}

/// `ref_id` arrives as a number; keep it as text.
fn ref_id(data: &Value) -> Option<String> {
    match data.get("ref_id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl PaymentGateway for ZarinpalGateway {
    async fn request_payment(&self, amount: Money, description: &str) -> Result<String, GatewayError> {
        let body = RequestBody {
            merchant_id: &self.config.merchant_id,
            amount: amount.minor(),
            callback_url: &self.config.callback_url,
            description,
        };

        let response = self.post(&self.config.request_url, &body).await?;

        if has_errors(&response) {
            let (code, message) = error_code(&response);
            return Err(GatewayError::Rejected { code, message });
        }

        let data = response
            .get("data")
            .ok_or_else(|| GatewayError::MalformedResponse("missing data".to_string()))?;

        if let Some(code) = data.get("code").and_then(Value::as_i64) {
            if code != CODE_OK {
                return Err(GatewayError::Rejected {
                    code,
                    message: "payment request not accepted".to_string(),
                });
            }
        }

        let authority = data
            .get("authority")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| GatewayError::MalformedResponse("authority not returned".to_string()))?;

        debug!(authority = %authority, amount = amount.minor(), "Gateway issued authority");
        Ok(authority.to_string())
    }

    async fn verify_payment(&self, amount: Money, authority: &str) -> Result<Verification, GatewayError> {
        let body = VerifyBody {
            merchant_id: &self.config.merchant_id,
            amount: amount.minor(),
            authority,
        };

        let response = self.post(&self.config.verify_url, &body).await?;

        if has_errors(&response) {
            let (code, message) = error_code(&response);
            debug!(authority = %authority, code, message = %message, "Gateway refused verification");
            return Ok(Verification {
                verified: false,
                ref_id: None,
                code: Some(code),
                raw_response: response,
            });
        }

        let data = response
            .get("data")
            .ok_or_else(|| GatewayError::MalformedResponse("missing data".to_string()))?;
        let code = data.get("code").and_then(Value::as_i64);
        let ref_id = ref_id(data);

        Ok(Verification {
            verified: matches!(code, Some(CODE_OK) | Some(CODE_ALREADY_VERIFIED)),
            ref_id,
            code,
            raw_response: response,
        })
    }

    fn redirect_url(&self, authority: &str) -> String {
        self.config.start_pay_url.replace("{authority}", authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> ZarinpalGateway {
        let config = GatewayConfig {
            merchant_id: "merchant-1".into(),
            callback_url: "http://shop.test/payments/verify".into(),
            timeout_secs: 1,
            ..GatewayConfig::default()
        }
        .with_base_url(&server.uri());
        ZarinpalGateway::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_request_payment_returns_authority() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pg/v4/payment/request.json"))
            .and(body_partial_json(json!({
                "merchant_id": "merchant-1",
                "amount": 1_584_000,
                "callback_url": "http://shop.test/payments/verify"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "code": 100, "message": "Success", "authority": "A0000000000000000000000000000abcd" },
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        let authority = gw
            .request_payment(Money::from_minor(1_584_000), "order 1")
            .await
            .unwrap();

        assert_eq!(authority, "A0000000000000000000000000000abcd");
        assert_eq!(
            gw.redirect_url(&authority),
            format!("{}/pg/StartPay/A0000000000000000000000000000abcd", server.uri())
        );
    }

    #[tokio::test]
    async fn test_request_payment_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pg/v4/payment/request.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "errors": { "code": -9, "message": "The input params invalid, validation error." }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .request_payment(Money::from_minor(10), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { code: -9, .. }));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .request_payment(Money::from_minor(10), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Status(503)));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(json!({ "data": { "code": 100, "authority": "A1" }, "errors": [] })),
            )
            .mount(&server)
            .await;

        let err = gateway(&server)
            .await
            .request_payment(Money::from_minor(10), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
    }

    #[tokio::test]
    async fn test_verify_success_and_already_verified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pg/v4/payment/verify.json"))
            .and(body_partial_json(json!({ "authority": "A1", "amount": 5000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "code": 100, "ref_id": 201, "card_pan": "502229******5995" },
                "errors": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pg/v4/payment/verify.json"))
            .and(body_partial_json(json!({ "authority": "A2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "code": 101, "ref_id": 202 },
                "errors": []
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;

        let first = gw.verify_payment(Money::from_minor(5000), "A1").await.unwrap();
        assert!(first.verified);
        assert_eq!(first.ref_id.as_deref(), Some("201"));
        assert_eq!(first.code, Some(100));

        let second = gw.verify_payment(Money::from_minor(5000), "A2").await.unwrap();
        assert!(second.verified);
        assert_eq!(second.code, Some(101));
    }

    #[tokio::test]
    async fn test_verify_errors_are_unverified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pg/v4/payment/verify.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "errors": { "code": -51, "message": "Session is not valid, session is not active paid try." }
            })))
            .mount(&server)
            .await;

        let result = gateway(&server)
            .await
            .verify_payment(Money::from_minor(5000), "A1")
            .await
            .unwrap();
        assert!(!result.verified);
        assert_eq!(result.code, Some(-51));
        assert!(result.raw_string().contains("-51"));
    }
}
