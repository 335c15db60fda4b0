// comanda/src/approval/mod.rs

//! The staff side of the order flow: polling, new-order alerts, the
//! "accepting orders" gate and bulk accept.
//!
//! The workflow talks to orders through [`StaffOrders`], so the same logic runs
//! in-process against an [`OrderLifecycle`] or remotely over the HTTP API.

pub mod alarm;
pub mod snapshot;
pub mod workflow;

use async_trait::async_trait;

use crate::error::OrderResult;
use crate::identity::Principal;
use crate::lifecycle::OrderLifecycle;
use crate::model::{Order, OrderId};
use crate::store::OrderQuery;

pub use alarm::{AlarmChange, AlertSink, PendingAlarm, TracingAlertSink, ALARM_INTERVAL};
pub use snapshot::{detect_new_pending, SnapshotTracker};
pub use workflow::{ApprovalWorkflow, BulkReport, TickReport, AUTO_REJECT_NOTE, POLL_INTERVAL};

/// The order operations a kitchen or admin surface needs.
#[async_trait]
pub trait StaffOrders: Send + Sync {
  /// The full recent order list, newest first.
  async fn fetch_all(&self) -> OrderResult<Vec<Order>>;

  async fn accept(&self, id: OrderId, prep_time_minutes: Option<u32>) -> OrderResult<Order>;

  async fn reject(&self, id: OrderId, note: Option<String>) -> OrderResult<Order>;
}

/// `StaffOrders` backed directly by the lifecycle engine, acting as `principal`.
#[derive(Debug, Clone)]
pub struct EngineStaffOrders {
  lifecycle: OrderLifecycle,
  principal: Principal,
}

impl EngineStaffOrders {
  pub fn new(lifecycle: OrderLifecycle, principal: Principal) -> Self {
    Self { lifecycle, principal }
  }
}

#[async_trait]
impl StaffOrders for EngineStaffOrders {
  async fn fetch_all(&self) -> OrderResult<Vec<Order>> {
    self.lifecycle.orders(&self.principal, &OrderQuery::recent()).await
  }

  async fn accept(&self, id: OrderId, prep_time_minutes: Option<u32>) -> OrderResult<Order> {
    self.lifecycle.accept(&self.principal, id, prep_time_minutes).await
  }

  async fn reject(&self, id: OrderId, note: Option<String>) -> OrderResult<Order> {
    self.lifecycle.reject(&self.principal, id, note).await
  }
}
