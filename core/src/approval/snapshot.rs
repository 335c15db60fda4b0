// comanda/src/approval/snapshot.rs

use std::collections::HashMap;

use crate::model::{Order, OrderId, OrderStatus};

/// Ids in `curr` that are `pending` now but were not `pending` (or not present) in `prev`.
/// Keeps the order of `curr`.
pub fn detect_new_pending(prev: &HashMap<OrderId, OrderStatus>, curr: &[Order]) -> Vec<OrderId> {
  curr
    .iter()
    .filter(|o| o.status == OrderStatus::Pending)
    .filter(|o| prev.get(&o.id) != Some(&OrderStatus::Pending))
    .map(|o| o.id)
    .collect()
}

/// The last order list a polling client saw.
///
/// The first observation only seeds the snapshot; alerts start with the second.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
  initialized: bool,
  orders: Vec<Order>,
  statuses: HashMap<OrderId, OrderStatus>,
}

impl SnapshotTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  /// Replaces the snapshot with `orders` and returns the newly pending ones.
  pub fn observe(&mut self, orders: Vec<Order>) -> Vec<Order> {
    let fresh = if self.initialized {
      let ids = detect_new_pending(&self.statuses, &orders);
      orders.iter().filter(|o| ids.contains(&o.id)).cloned().collect()
    } else {
      Vec::new()
    };
    self.statuses = orders.iter().map(|o| (o.id, o.status)).collect();
    self.orders = orders;
    self.initialized = true;
    fresh
  }

  pub fn orders(&self) -> &[Order] {
    &self.orders
  }

  pub fn pending_ids(&self) -> Vec<OrderId> {
    self
      .orders
      .iter()
      .filter(|o| o.status == OrderStatus::Pending)
      .map(|o| o.id)
      .collect()
  }

  pub fn pending_count(&self) -> usize {
    self.orders.iter().filter(|o| o.status == OrderStatus::Pending).count()
  }

  /// Optimistically rewrites one order's status in the local snapshot.
  /// Returns the previous status so the caller can roll back.
  pub fn set_local_status(&mut self, id: OrderId, status: OrderStatus) -> Option<OrderStatus> {
    let order = self.orders.iter_mut().find(|o| o.id == id)?;
    let previous = order.status;
    order.status = status;
    self.statuses.insert(id, status);
    Some(previous)
  }
}
