// comanda/src/mailer.rs

//! Outbound transactional email.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::OrderResult;
use crate::model::{LineItem, Order, OrderId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
  pub recipient: String,
  pub customer_name: String,
  pub order_id: OrderId,
  pub items: Vec<LineItem>,
  pub total: Decimal,
}

impl OrderConfirmation {
  /// `None` when the order has no email to send to.
  pub fn for_order(order: &Order) -> Option<Self> {
    let recipient = order.customer_email.clone().filter(|e| !e.trim().is_empty())?;
    Some(Self {
      recipient,
      customer_name: order.customer_name.clone().unwrap_or_else(|| "Valued Customer".to_string()),
      order_id: order.id,
      items: order.items.clone(),
      total: order.total_amount,
    })
  }

  /// The short reference printed on receipts: last eight characters of the id, upper-cased.
  pub fn short_reference(&self) -> String {
    let id = self.order_id.simple().to_string();
    id[id.len() - 8..].to_uppercase()
  }
}

#[async_trait]
pub trait Mailer: Send + Sync {
  /// Returns the provider's message id.
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> OrderResult<String>;
}
