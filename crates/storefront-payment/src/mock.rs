//! Scripted in-process gateway for tests and local development.
//!
//! Outcomes are queued per operation and consumed in order. With an empty
//! queue every request succeeds with a fresh authority and every verify
//! succeeds with a fresh reference id.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use storefront_core::Money;
use tokio::sync::Mutex;

use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, Verification};

#[derive(Debug, Default)]
pub struct MockGateway {
    requests: Mutex<VecDeque<Result<String, GatewayError>>>,
    verifications: Mutex<VecDeque<Result<Verification, GatewayError>>>,
    requested_amounts: Mutex<Vec<Money>>,
    request_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        MockGateway::default()
    }

    /// Queues the outcome of the next `request_payment`.
    pub async fn push_request(&self, outcome: Result<String, GatewayError>) {
        self.requests.lock().await.push_back(outcome);
    }

    /// Queues the outcome of the next `verify_payment`.
    pub async fn push_verify(&self, outcome: Result<Verification, GatewayError>) {
        self.verifications.lock().await.push_back(outcome);
    }

    pub fn verified(ref_id: &str) -> Verification {
        Verification {
            verified: true,
            ref_id: Some(ref_id.to_string()),
            code: Some(100),
            raw_response: json!({ "data": { "code": 100, "ref_id": ref_id }, "errors": [] }),
        }
    }

    pub fn unverified(code: i64) -> Verification {
        Verification {
            verified: false,
            ref_id: None,
            code: Some(code),
            raw_response: json!({ "data": [], "errors": { "code": code } }),
        }
    }

    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Amounts passed to `request_payment`, in call order.
    pub async fn requested_amounts(&self) -> Vec<Money> {
        self.requested_amounts.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn request_payment(&self, amount: Money, _description: &str) -> Result<String, GatewayError> {
        let n = self.request_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested_amounts.lock().await.push(amount);

        match self.requests.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(format!("MOCK-AUTH-{n:06}")),
        }
    }

    async fn verify_payment(&self, _amount: Money, _authority: &str) -> Result<Verification, GatewayError> {
        let n = self.verify_calls.fetch_add(1, Ordering::SeqCst) + 1;

        match self.verifications.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(MockGateway::verified(&format!("MOCK-REF-{n:06}"))),
        }
    }

    fn redirect_url(&self, authority: &str) -> String {
        format!("https://mock.gateway/StartPay/{authority}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let gw = MockGateway::new();
        gw.push_request(Err(GatewayError::Timeout)).await;

        assert!(matches!(
            gw.request_payment(Money::from_minor(10), "x").await,
            Err(GatewayError::Timeout)
        ));
        let authority = gw.request_payment(Money::from_minor(20), "x").await.unwrap();
        assert_eq!(authority, "MOCK-AUTH-000002");
        assert_eq!(gw.request_calls(), 2);
        assert_eq!(
            gw.requested_amounts().await,
            vec![Money::from_minor(10), Money::from_minor(20)]
        );
    }
}
