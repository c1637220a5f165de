//! # storefront-payment: Gateway Client & Payment Reconciliation
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       storefront-payment                                │
//! │                                                                         │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │                     PaymentService                              │    │
//! │  │   request_payment(user, order)   reconcile(authority, hint)     │    │
//! │  └───────────────┬─────────────────────────────┬──────────────────┘    │
//! │                  │                             │                        │
//! │                  ▼                             ▼                        │
//! │  ┌──────────────────────────┐   ┌──────────────────────────────┐       │
//! │  │  dyn PaymentGateway      │   │  storefront-db               │       │
//! │  │  ├── ZarinpalGateway     │   │  PaymentRepository           │       │
//! │  │  └── MockGateway         │   │  (open_attempt / settle_*)   │       │
//! │  └──────────────────────────┘   └──────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Network calls and write transactions never overlap: the gateway is called
//! first, the outcome is applied afterwards in one transaction.

pub mod config;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod service;
pub mod zarinpal;

pub use config::GatewayConfig;
pub use error::{GatewayError, PaymentError, PaymentResult};
pub use gateway::{PaymentGateway, Verification};
pub use mock::MockGateway;
pub use service::{PaymentRedirect, PaymentService};
pub use zarinpal::ZarinpalGateway;
