// comanda/src/approval/alarm.rs

use std::time::Duration;
use tracing::{info, warn};

use crate::model::Order;

/// How often the alarm repeats while anything is pending.
pub const ALARM_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmChange {
  Started,
  Stopped,
  Unchanged,
}

/// Sticky alarm state: on while at least one order is pending.
#[derive(Debug, Clone, Default)]
pub struct PendingAlarm {
  active: bool,
  pending: usize,
}

impl PendingAlarm {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, pending_count: usize) -> AlarmChange {
    self.pending = pending_count;
    match (self.active, pending_count > 0) {
      (false, true) => {
        self.active = true;
        AlarmChange::Started
      }
      (true, false) => {
        self.active = false;
        AlarmChange::Stopped
      }
      _ => AlarmChange::Unchanged,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn pending(&self) -> usize {
    self.pending
  }
}

/// Where alerts go: a speaker, a desktop notification, a log.
pub trait AlertSink: Send + Sync {
  /// Called once per order that newly entered `pending`.
  fn new_pending(&self, order: &Order);

  /// Called on every alarm repetition.
  fn chime(&self, pending_count: usize);

  fn silenced(&self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
  fn new_pending(&self, order: &Order) {
    info!(
      order_id = %order.id,
      customer = order.customer_name.as_deref().unwrap_or("-"),
      items = %order.item_summary(),
      total = %order.total_amount,
      "New order awaiting approval."
    );
  }

  fn chime(&self, pending_count: usize) {
    warn!(pending_count, "Orders waiting for approval.");
  }

  fn silenced(&self) {
    info!("No orders pending, alarm stopped.");
  }
}
