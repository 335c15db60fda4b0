// comanda/src/store/memory.rs

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::{OrderQuery, OrderStore, OrderUpdate};
use crate::error::{OrderError, OrderResult};
use crate::model::{Order, OrderId};

#[derive(Debug, Default)]
struct Inner {
  orders: HashMap<OrderId, Order>,
  sessions: HashMap<String, OrderId>,
  // Insertion sequence, breaks created_at ties when listing.
  seq: HashMap<OrderId, u64>,
  next_seq: u64,
}

/// Process-local store. One write lock per mutation gives the same
/// single-document atomicity a database conditional update would.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
  inner: RwLock<Inner>,
}

impl InMemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.inner.read().orders.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
  #[instrument(skip(self, order), fields(order_id = %order.id))]
  async fn insert(&self, order: Order) -> OrderResult<Order> {
    let mut inner = self.inner.write();
    if let Some(session_id) = &order.stripe_session_id {
      if inner.sessions.contains_key(session_id) {
        return Err(OrderError::DuplicateKey {
          session_id: session_id.clone(),
        });
      }
      inner.sessions.insert(session_id.clone(), order.id);
    }
    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner.seq.insert(order.id, seq);
    inner.orders.insert(order.id, order.clone());
    debug!("Order stored.");
    Ok(order)
  }

  async fn get(&self, id: OrderId) -> OrderResult<Option<Order>> {
    Ok(self.inner.read().orders.get(&id).cloned())
  }

  async fn get_by_session(&self, session_id: &str) -> OrderResult<Option<Order>> {
    let inner = self.inner.read();
    Ok(
      inner
        .sessions
        .get(session_id)
        .and_then(|id| inner.orders.get(id))
        .cloned(),
    )
  }

  async fn find(&self, query: &OrderQuery) -> OrderResult<Vec<Order>> {
    let inner = self.inner.read();
    let mut matched: Vec<&Order> = match query {
      OrderQuery::ById(id) => inner.orders.get(id).into_iter().collect(),
      OrderQuery::BySession(session_id) => inner
        .sessions
        .get(session_id)
        .and_then(|id| inner.orders.get(id))
        .into_iter()
        .collect(),
      OrderQuery::ByGuest(guest_id) => inner
        .orders
        .values()
        .filter(|o| o.guest_id.as_deref() == Some(guest_id.as_str()))
        .collect(),
      OrderQuery::ByEmail(email) => inner.orders.values().filter(|o| o.email_matches(email)).collect(),
      OrderQuery::Recent { .. } => inner.orders.values().collect(),
    };

    let seq_of = |o: &Order| inner.seq.get(&o.id).copied().unwrap_or_default();
    matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| seq_of(b).cmp(&seq_of(a))));
    if let OrderQuery::Recent { limit } = query {
      matched.truncate(*limit);
    }
    Ok(matched.into_iter().cloned().collect())
  }

  #[instrument(skip(self, update), fields(order_id = %id))]
  async fn apply(&self, id: OrderId, update: OrderUpdate) -> OrderResult<Order> {
    let mut inner = self.inner.write();
    let order = inner
      .orders
      .get_mut(&id)
      .ok_or_else(|| OrderError::not_found(format!("order {}", id)))?;
    if !update.guard.admits(order.status) {
      return Err(OrderError::InvalidTransition {
        from: order.status,
        to: update.status.unwrap_or(order.status),
      });
    }
    update.apply_to(order);
    Ok(order.clone())
  }
}
