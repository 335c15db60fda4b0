// comanda/src/model/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::OrderStatus;
use crate::error::{OrderError, OrderResult};
use crate::identity::{Principal, Role};

pub type OrderId = Uuid;

/// Default preparation time applied on creation and on accept when nothing else is given.
pub const DEFAULT_PREP_TIME_MINUTES: u32 = 15;

/// The discrete prep-time choices offered to staff. The engine accepts any positive value.
pub const PREP_TIME_PRESETS: [u32; 8] = [5, 10, 15, 20, 25, 30, 45, 60];

/// One line of an order. The customisation fields are opaque to the lifecycle engine.
///
/// Field names follow the checkout metadata format (`qty`, `meatType`, ...), which is
/// also what gets serialized into the payment-processor metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  pub name: String,
  #[serde(alias = "quantity")]
  pub qty: u32,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
  #[serde(default)]
  pub meat_type: Option<String>,
  #[serde(default)]
  pub sauce: Option<String>,
  #[serde(default)]
  pub toppings: Option<Vec<String>>,
}

impl LineItem {
  pub fn new(name: impl Into<String>, qty: u32, price: Decimal) -> Self {
    Self {
      name: name.into(),
      qty,
      price,
      meat_type: None,
      sauce: None,
      toppings: None,
    }
  }

  /// Price times quantity; fails instead of overflowing.
  pub fn line_total(&self) -> OrderResult<Decimal> {
    self
      .price
      .checked_mul(Decimal::from(self.qty))
      .ok_or_else(|| OrderError::Validation(format!("'{}' total is out of range", self.name)))
  }
}

/// Sum of every line total.
pub fn items_total(items: &[LineItem]) -> OrderResult<Decimal> {
  items.iter().try_fold(Decimal::ZERO, |acc, item| {
    acc
      .checked_add(item.line_total()?)
      .ok_or_else(|| OrderError::Validation("order total is out of range".to_string()))
  })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
  pub status: OrderStatus,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

impl StatusEntry {
  pub fn new(status: OrderStatus, timestamp: DateTime<Utc>, note: Option<String>) -> Self {
    Self { status, timestamp, note }
  }
}

/// Name/email/phone as given at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
}

/// Everything needed to create an order. Built by payment intake or the dev-order path.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
  pub stripe_session_id: Option<String>,
  pub payment_intent_id: Option<String>,
  pub user_id: Option<String>,
  pub guest_id: Option<String>,
  pub customer: CustomerSnapshot,
  pub items: Vec<LineItem>,
  pub total_amount: Decimal,
  pub prep_time_minutes: Option<u32>,
}

impl NewOrder {
  /// Checks the creation-time invariants: a non-negative total and at least one way
  /// to find the order again (user id, guest id or email).
  pub fn validate(&self) -> OrderResult<()> {
    if self.total_amount.is_sign_negative() {
      return Err(OrderError::Validation(format!(
        "total amount must be non-negative, got {}",
        self.total_amount
      )));
    }
    let has_linkage = [&self.user_id, &self.guest_id, &self.customer.email]
      .iter()
      .any(|v| v.as_deref().map_or(false, |s| !s.trim().is_empty()));
    if !has_linkage {
      return Err(OrderError::Validation(
        "order needs a user id, guest id or customer email".to_string(),
      ));
    }
    if let Some(0) = self.prep_time_minutes {
      return Err(OrderError::Validation("prep time must be positive".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: OrderId,
  pub stripe_session_id: Option<String>,
  pub payment_intent_id: Option<String>,
  pub user_id: Option<String>,
  pub guest_id: Option<String>,
  pub customer_name: Option<String>,
  pub customer_email: Option<String>,
  pub customer_phone: Option<String>,
  pub items: Vec<LineItem>,
  #[serde(with = "rust_decimal::serde::float")]
  pub total_amount: Decimal,
  pub status: OrderStatus,
  pub prep_time_minutes: u32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub estimated_ready_at: Option<DateTime<Utc>>,
  pub status_history: Vec<StatusEntry>,
  pub refund_id: Option<String>,
  pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
  /// Materializes a validated `NewOrder` as a `pending` order with its first history entry.
  pub fn from_new(new: NewOrder, id: OrderId, now: DateTime<Utc>, note: Option<String>) -> Self {
    Self {
      id,
      stripe_session_id: new.stripe_session_id,
      payment_intent_id: new.payment_intent_id,
      user_id: new.user_id,
      guest_id: new.guest_id.filter(|g| !g.is_empty()),
      customer_name: new.customer.name,
      customer_email: new.customer.email,
      customer_phone: new.customer.phone,
      items: new.items,
      total_amount: new.total_amount,
      status: OrderStatus::Pending,
      prep_time_minutes: new.prep_time_minutes.unwrap_or(DEFAULT_PREP_TIME_MINUTES),
      created_at: now,
      updated_at: now,
      estimated_ready_at: None,
      status_history: vec![StatusEntry::new(OrderStatus::Pending, now, note)],
      refund_id: None,
      refunded_at: None,
    }
  }

  pub fn email_matches(&self, email: &str) -> bool {
    match &self.customer_email {
      Some(stored) => !stored.is_empty() && stored.trim().eq_ignore_ascii_case(email.trim()),
      None => false,
    }
  }

  /// Read access for non-staff callers: their guest id, user id or email.
  pub fn is_visible_to(&self, principal: &Principal) -> bool {
    match principal.role {
      Role::Admin | Role::Staff => true,
      Role::Guest => self.guest_id.as_deref() == Some(principal.subject_id.as_str()),
      Role::Customer => {
        self.user_id.as_deref() == Some(principal.subject_id.as_str())
          || principal.email.as_deref().map_or(false, |e| self.email_matches(e))
      }
    }
  }

  pub fn item_summary(&self) -> String {
    self
      .items
      .iter()
      .map(|item| format!("{}x {}", item.qty, item.name))
      .collect::<Vec<_>>()
      .join(", ")
  }
}

/// How callers address a single order: by internal id or by payment session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
  Id(OrderId),
  Session(String),
}

impl std::fmt::Display for OrderRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OrderRef::Id(id) => write!(f, "order {}", id),
      OrderRef::Session(session) => write!(f, "session {}", session),
    }
  }
}
