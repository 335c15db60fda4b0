// comanda/src/model/status.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an order sits in its lifecycle.
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  /// Paid, awaiting staff approval.
  Pending,
  Received,
  Preparing,
  Ready,
  Completed,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Received,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
  ];

  pub const NON_TERMINAL: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Received,
    OrderStatus::Preparing,
    OrderStatus::Ready,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Received => "received",
      OrderStatus::Preparing => "preparing",
      OrderStatus::Ready => "ready",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
  }

  /// The single forward step taken by `advance`, if any.
  ///
  /// `Pending` has no advance step: leaving it requires an explicit accept or reject.
  pub fn next_step(&self) -> Option<OrderStatus> {
    match self {
      OrderStatus::Received => Some(OrderStatus::Preparing),
      OrderStatus::Preparing => Some(OrderStatus::Ready),
      OrderStatus::Ready => Some(OrderStatus::Completed),
      _ => None,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .iter()
      .copied()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| format!("unknown order status '{}'", s))
  }
}
