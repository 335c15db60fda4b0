// comanda/src/payment/mod.rs

//! The payment-processor contract: hosted checkout sessions and refunds.

pub mod checkout;
pub mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::OrderResult;

pub use checkout::{build_checkout_request, CartItem, CheckoutDraft};
pub use signature::{sign_payload, verify_signature, DEFAULT_TOLERANCE_SECS};

/// One priced line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
  pub name: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
  pub unit_amount_cents: i64,
  pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
  pub line_items: Vec<CheckoutLine>,
  pub customer_email: Option<String>,
  pub success_url: String,
  pub cancel_url: String,
  /// Flat string metadata echoed back on the completion webhook.
  pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
  pub id: String,
  pub url: Option<String>,
}

/// A full refund unless `amount_cents` is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
  pub payment_intent_id: String,
  pub amount_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
  pub id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> OrderResult<CheckoutSession>;

  /// Transport or processor failures surface as `UpstreamUnavailable`.
  async fn refund(&self, request: &RefundRequest) -> OrderResult<RefundReceipt>;
}
