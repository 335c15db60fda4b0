// comanda/src/intake/event.rs

//! Wire shapes of the payment processor's webhook events.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

use super::chunking::{decode_items, CUSTOMER_NAME_KEY, CUSTOMER_PHONE_KEY, GUEST_ID_KEY, USER_ID_KEY};
use crate::error::{OrderError, OrderResult};
use crate::model::{CustomerSnapshot, NewOrder};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(rename = "type")]
  pub event_type: String,
  pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
  pub object: serde_json::Value,
}

/// `payment_intent` is either an id or an expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PaymentIntentRef {
  Id(String),
  Expanded { id: String },
}

impl PaymentIntentRef {
  pub fn id(&self) -> &str {
    match self {
      PaymentIntentRef::Id(id) | PaymentIntentRef::Expanded { id } => id,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
  #[serde(default)]
  pub email: Option<String>,
}

/// The `data.object` of a completed checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedSession {
  pub id: String,
  #[serde(default)]
  pub payment_intent: Option<PaymentIntentRef>,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub customer_details: Option<CustomerDetails>,
  /// Minor units (cents).
  #[serde(default)]
  pub amount_total: Option<i64>,
  #[serde(default)]
  pub metadata: Option<HashMap<String, String>>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
  value.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

impl CompletedSession {
  pub fn from_event(event: &WebhookEvent) -> OrderResult<Self> {
    serde_json::from_value(event.data.object.clone())
      .map_err(|e| OrderError::MalformedPayload(format!("checkout session object: {}", e)))
  }

  pub fn metadata(&self) -> HashMap<String, String> {
    self.metadata.clone().unwrap_or_default()
  }

  /// `800` cents becomes `8.00`.
  pub fn total(&self) -> Decimal {
    Decimal::new(self.amount_total.unwrap_or(0), 2)
  }

  pub fn email(&self) -> Option<String> {
    non_empty(self.customer_email.as_ref())
      .or_else(|| non_empty(self.customer_details.as_ref().and_then(|d| d.email.as_ref())))
  }

  /// The order this session pays for, items reassembled from metadata.
  pub fn to_new_order(&self) -> OrderResult<NewOrder> {
    let metadata = self.metadata();
    Ok(NewOrder {
      stripe_session_id: Some(self.id.clone()),
      payment_intent_id: self.payment_intent.as_ref().map(|p| p.id().to_string()),
      user_id: non_empty(metadata.get(USER_ID_KEY)),
      guest_id: non_empty(metadata.get(GUEST_ID_KEY)),
      customer: CustomerSnapshot {
        name: non_empty(metadata.get(CUSTOMER_NAME_KEY)),
        email: self.email(),
        phone: non_empty(metadata.get(CUSTOMER_PHONE_KEY)),
      },
      items: decode_items(&metadata)?,
      total_amount: self.total(),
      prep_time_minutes: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn event(object: serde_json::Value) -> WebhookEvent {
    serde_json::from_value(json!({ "id": "evt_1", "type": CHECKOUT_COMPLETED, "data": { "object": object } })).unwrap()
  }

  #[test]
  fn converts_cents_and_reads_metadata() {
    let ev = event(json!({
      "id": "cs_test_1",
      "payment_intent": "pi_1",
      "customer_email": "ana@example.com",
      "amount_total": 800,
      "metadata": {
        "orderItems": "[{\"name\":\"Taco\",\"qty\":2,\"price\":4}]",
        "customerName": "Ana",
        "customerPhone": "",
        "guestId": ""
      }
    }));
    let new = CompletedSession::from_event(&ev).unwrap().to_new_order().unwrap();
    assert_eq!(new.total_amount, Decimal::new(800, 2));
    assert_eq!(new.total_amount.to_string(), "8.00");
    assert_eq!(new.payment_intent_id.as_deref(), Some("pi_1"));
    assert_eq!(new.guest_id, None);
    assert_eq!(new.customer.phone, None);
    assert_eq!(new.items.len(), 1);
    assert_eq!(new.items[0].qty, 2);
  }

  #[test]
  fn expanded_payment_intent_and_missing_metadata() {
    let ev = event(json!({
      "id": "cs_2",
      "payment_intent": { "id": "pi_2", "object": "payment_intent" },
      "customer_details": { "email": "bo@example.com" },
      "metadata": null
    }));
    let session = CompletedSession::from_event(&ev).unwrap();
    let new = session.to_new_order().unwrap();
    assert_eq!(new.payment_intent_id.as_deref(), Some("pi_2"));
    assert_eq!(new.customer.email.as_deref(), Some("bo@example.com"));
    assert!(new.items.is_empty());
    assert_eq!(new.total_amount, Decimal::ZERO);
  }
}
