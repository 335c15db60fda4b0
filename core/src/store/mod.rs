// comanda/src/store/mod.rs

//! The order store contract.
//!
//! Stores are document-shaped: each mutation touches exactly one order and is
//! conditional on the order's current status, so concurrent writers cannot
//! interleave a half-applied transition.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::OrderResult;
use crate::model::{Order, OrderId, OrderStatus, StatusEntry};

pub use memory::InMemoryOrderStore;

/// Upper bound for the staff "all orders" listing.
pub const RECENT_ORDERS_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderQuery {
  ById(OrderId),
  BySession(String),
  ByGuest(String),
  /// Case-insensitive match on the customer email.
  ByEmail(String),
  /// Newest first.
  Recent { limit: usize },
}

impl OrderQuery {
  pub fn recent() -> Self {
    OrderQuery::Recent {
      limit: RECENT_ORDERS_LIMIT,
    }
  }

  /// Whether this query answers for a specific caller rather than the whole kitchen.
  pub fn is_scoped(&self) -> bool {
    !matches!(self, OrderQuery::Recent { .. })
  }
}

/// The precondition of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusGuard {
  Exactly(OrderStatus),
  OneOf(Vec<OrderStatus>),
}

impl StatusGuard {
  pub fn non_terminal() -> Self {
    StatusGuard::OneOf(OrderStatus::NON_TERMINAL.to_vec())
  }

  pub fn admits(&self, status: OrderStatus) -> bool {
    match self {
      StatusGuard::Exactly(expected) => *expected == status,
      StatusGuard::OneOf(allowed) => allowed.contains(&status),
    }
  }

  pub fn allowed(&self) -> Vec<OrderStatus> {
    match self {
      StatusGuard::Exactly(s) => vec![*s],
      StatusGuard::OneOf(v) => v.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtaUpdate {
  Keep,
  Set(DateTime<Utc>),
  /// Only rewrite the estimate if one is already present.
  RebaseIfSet(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundStamp {
  pub refund_id: String,
  pub refunded_at: DateTime<Utc>,
}

/// A single guarded mutation of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
  pub guard: StatusGuard,
  /// New status; `None` keeps the current one.
  pub status: Option<OrderStatus>,
  pub prep_time_minutes: Option<u32>,
  pub eta: EtaUpdate,
  pub refund: Option<RefundStamp>,
  pub history: Option<StatusEntry>,
  pub updated_at: DateTime<Utc>,
}

impl OrderUpdate {
  pub fn guarded(guard: StatusGuard, updated_at: DateTime<Utc>) -> Self {
    Self {
      guard,
      status: None,
      prep_time_minutes: None,
      eta: EtaUpdate::Keep,
      refund: None,
      history: None,
      updated_at,
    }
  }

  /// Moves to `to`, appending a history entry stamped with `updated_at`.
  pub fn transition(from: StatusGuard, to: OrderStatus, updated_at: DateTime<Utc>, note: Option<String>) -> Self {
    Self {
      status: Some(to),
      history: Some(StatusEntry::new(to, updated_at, note)),
      ..Self::guarded(from, updated_at)
    }
  }

  pub fn with_prep_time(mut self, minutes: u32) -> Self {
    self.prep_time_minutes = Some(minutes);
    self
  }

  pub fn with_eta(mut self, eta: EtaUpdate) -> Self {
    self.eta = eta;
    self
  }

  pub fn with_refund(mut self, refund: RefundStamp) -> Self {
    self.refund = Some(refund);
    self
  }

  /// Applies the update to an in-memory order. The guard must already have been checked.
  pub fn apply_to(&self, order: &mut Order) {
    if let Some(status) = self.status {
      order.status = status;
    }
    if let Some(minutes) = self.prep_time_minutes {
      order.prep_time_minutes = minutes;
    }
    match self.eta {
      EtaUpdate::Keep => {}
      EtaUpdate::Set(at) => order.estimated_ready_at = Some(at),
      EtaUpdate::RebaseIfSet(at) => {
        if order.estimated_ready_at.is_some() {
          order.estimated_ready_at = Some(at);
        }
      }
    }
    if let Some(refund) = &self.refund {
      order.refund_id = Some(refund.refund_id.clone());
      order.refunded_at = Some(refund.refunded_at);
    }
    if let Some(entry) = &self.history {
      order.status_history.push(entry.clone());
    }
    order.updated_at = self.updated_at;
  }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Persists a new order. Fails with `DuplicateKey` if another order already
  /// carries the same payment session id.
  async fn insert(&self, order: Order) -> OrderResult<Order>;

  async fn get(&self, id: OrderId) -> OrderResult<Option<Order>>;

  async fn get_by_session(&self, session_id: &str) -> OrderResult<Option<Order>>;

  /// Orders matching `query`, newest first.
  async fn find(&self, query: &OrderQuery) -> OrderResult<Vec<Order>>;

  /// Atomically applies `update` if the order's current status passes the guard.
  ///
  /// Fails with `NotFound` when the order does not exist and `InvalidTransition`
  /// (carrying the actual current status) when the guard rejects it.
  async fn apply(&self, id: OrderId, update: OrderUpdate) -> OrderResult<Order>;
}
