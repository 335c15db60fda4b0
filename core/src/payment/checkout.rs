// comanda/src/payment/checkout.rs

//! Turning a cart into a checkout request.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CheckoutLine, CheckoutRequest};
use crate::error::{OrderError, OrderResult};
use crate::intake::chunking::{encode_items, CUSTOMER_NAME_KEY, CUSTOMER_PHONE_KEY, GUEST_ID_KEY, USER_ID_KEY};
use crate::model::LineItem;

/// A cart line as the storefront sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub name: String,
  #[serde(alias = "qty")]
  pub quantity: u32,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
  #[serde(default)]
  pub meat_type: Option<String>,
  #[serde(default)]
  pub sauce: Option<String>,
  #[serde(default)]
  pub toppings: Option<Vec<String>>,
  #[serde(default)]
  pub image: Option<String>,
}

impl CartItem {
  fn description(&self) -> Option<String> {
    let meat = self.meat_type.as_deref().filter(|m| !m.is_empty())?;
    Some(match self.sauce.as_deref().filter(|s| !s.is_empty()) {
      Some(sauce) => format!("{} with {}", meat, sauce),
      None => meat.to_string(),
    })
  }

  fn to_line_item(&self) -> LineItem {
    LineItem {
      name: self.name.clone(),
      qty: self.quantity,
      price: self.price,
      meat_type: self.meat_type.clone().filter(|m| !m.is_empty()),
      sauce: self.sauce.clone().filter(|s| !s.is_empty()),
      toppings: self.toppings.clone().filter(|t| !t.is_empty()),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDraft {
  pub items: Vec<CartItem>,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub customer_name: Option<String>,
  #[serde(default)]
  pub customer_phone: Option<String>,
  #[serde(default)]
  pub guest_id: Option<String>,
  #[serde(default)]
  pub user_id: Option<String>,
}

fn to_cents(price: Decimal) -> OrderResult<i64> {
  price
    .checked_mul(Decimal::ONE_HUNDRED)
    .and_then(|cents| cents.round().to_i64())
    .ok_or_else(|| OrderError::Validation(format!("price {} out of range", price)))
}

fn is_http_url(s: &str) -> bool {
  let lower = s.to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}

/// Builds the processor request for `draft`, with the item list chunked into metadata.
///
/// `base_url` is the storefront origin used for the success and cancel redirects.
pub fn build_checkout_request(draft: &CheckoutDraft, base_url: &str) -> OrderResult<CheckoutRequest> {
  if draft.items.is_empty() {
    return Err(OrderError::Validation("cart is empty".to_string()));
  }

  let mut line_items = Vec::with_capacity(draft.items.len());
  for item in &draft.items {
    if item.quantity == 0 {
      return Err(OrderError::Validation(format!("'{}' has zero quantity", item.name)));
    }
    if item.price.is_sign_negative() {
      return Err(OrderError::Validation(format!("'{}' has a negative price", item.name)));
    }
    line_items.push(CheckoutLine {
      name: item.name.clone(),
      description: item.description(),
      image_url: item.image.clone().filter(|url| is_http_url(url)),
      unit_amount_cents: to_cents(item.price)?,
      quantity: item.quantity,
    });
  }

  let items: Vec<LineItem> = draft.items.iter().map(CartItem::to_line_item).collect();
  let mut metadata: BTreeMap<String, String> = encode_items(&items)?.into_iter().collect();
  metadata.insert(CUSTOMER_NAME_KEY.to_string(), draft.customer_name.clone().unwrap_or_default());
  metadata.insert(CUSTOMER_PHONE_KEY.to_string(), draft.customer_phone.clone().unwrap_or_default());
  metadata.insert(GUEST_ID_KEY.to_string(), draft.guest_id.clone().unwrap_or_default());
  if let Some(user_id) = draft.user_id.as_ref().filter(|u| !u.is_empty()) {
    metadata.insert(USER_ID_KEY.to_string(), user_id.clone());
  }

  let base = base_url.trim_end_matches('/');
  Ok(CheckoutRequest {
    line_items,
    customer_email: draft.customer_email.clone().filter(|e| !e.trim().is_empty()),
    success_url: format!("{}/order-success?session_id={{CHECKOUT_SESSION_ID}}", base),
    cancel_url: format!("{}/menu", base),
    metadata,
  })
}
