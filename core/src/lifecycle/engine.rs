// comanda/src/lifecycle/engine.rs

use chrono::Duration;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::transitions::ensure_transition;
use crate::clock::Clock;
use crate::error::{OrderError, OrderResult};
use crate::identity::{Principal, Role};
use crate::model::{NewOrder, Order, OrderId, OrderRef, OrderStatus, DEFAULT_PREP_TIME_MINUTES};
use crate::payment::{PaymentGateway, RefundRequest};
use crate::store::{EtaUpdate, OrderQuery, OrderStore, OrderUpdate, RefundStamp, StatusGuard};

pub const CUSTOMER_CANCEL_NOTE: &str = "Customer cancelled within 2 minutes";
pub const SANDBOX_REFUND_ID: &str = "test_refund";

#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
  /// How long after `created_at` a customer may still self-cancel (inclusive).
  pub cancel_window: Duration,
  pub default_prep_minutes: u32,
  /// Session ids with this prefix get a simulated refund.
  pub sandbox_session_prefix: String,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self {
      cancel_window: Duration::minutes(2),
      default_prep_minutes: DEFAULT_PREP_TIME_MINUTES,
      sandbox_session_prefix: "test_".to_string(),
    }
  }
}

impl LifecyclePolicy {
  pub fn is_sandbox_session(&self, session_id: Option<&str>) -> bool {
    session_id.map_or(false, |s| s.starts_with(&self.sandbox_session_prefix))
  }
}

/// Drives orders through their lifecycle.
///
/// Every mutation reads the order once to produce a precise error, then commits
/// through a single status-guarded store update. A concurrent writer that got
/// there first turns our update into `InvalidTransition`.
#[derive(Clone)]
pub struct OrderLifecycle {
  store: Arc<dyn OrderStore>,
  payments: Arc<dyn PaymentGateway>,
  clock: Arc<dyn Clock>,
  policy: LifecyclePolicy,
}

impl std::fmt::Debug for OrderLifecycle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OrderLifecycle")
      .field("clock", &self.clock)
      .field("policy", &self.policy)
      .finish_non_exhaustive()
  }
}

fn positive_minutes(minutes: u32) -> OrderResult<u32> {
  if minutes == 0 {
    Err(OrderError::Validation("prep time must be a positive number of minutes".to_string()))
  } else {
    Ok(minutes)
  }
}

impl OrderLifecycle {
  pub fn new(store: Arc<dyn OrderStore>, payments: Arc<dyn PaymentGateway>, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      payments,
      clock,
      policy: LifecyclePolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> &LifecyclePolicy {
    &self.policy
  }

  pub fn store(&self) -> &Arc<dyn OrderStore> {
    &self.store
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  async fn load(&self, id: OrderId) -> OrderResult<Order> {
    self
      .store
      .get(id)
      .await?
      .ok_or_else(|| OrderError::not_found(OrderRef::Id(id).to_string()))
  }

  async fn resolve(&self, order: &OrderRef) -> OrderResult<Order> {
    let found = match order {
      OrderRef::Id(id) => self.store.get(*id).await?,
      OrderRef::Session(session_id) => self.store.get_by_session(session_id).await?,
    };
    found.ok_or_else(|| OrderError::not_found(order.to_string()))
  }

  /// Inserts a new `pending` order. `DuplicateKey` when the session id is taken.
  #[instrument(skip(self, new), fields(session_id = ?new.stripe_session_id))]
  pub async fn create(&self, mut new: NewOrder, note: Option<String>) -> OrderResult<Order> {
    new.validate()?;
    if new.prep_time_minutes.is_none() {
      new.prep_time_minutes = Some(self.policy.default_prep_minutes);
    }
    let order = Order::from_new(new, Uuid::new_v4(), self.clock.now(), note);
    let stored = self.store.insert(order).await?;
    info!(order_id = %stored.id, total = %stored.total_amount, "Order created.");
    Ok(stored)
  }

  /// A single order the caller may see.
  pub async fn find_one(&self, principal: &Principal, order: &OrderRef) -> OrderResult<Order> {
    let found = self.resolve(order).await?;
    if found.is_visible_to(principal) {
      Ok(found)
    } else {
      // Indistinguishable from a missing order for callers who don't own it.
      Err(OrderError::not_found(order.to_string()))
    }
  }

  /// Runs `query` on behalf of `principal`. The unscoped listing is staff-only;
  /// other callers only ever get back orders linked to them.
  pub async fn orders(&self, principal: &Principal, query: &OrderQuery) -> OrderResult<Vec<Order>> {
    if !query.is_scoped() {
      principal.require_staff()?;
    }
    let mut orders = self.store.find(query).await?;
    if !principal.is_staff() {
      orders.retain(|o| o.is_visible_to(principal));
    }
    Ok(orders)
  }

  /// `pending → received`, stamping `estimated_ready_at = now + prep`.
  #[instrument(skip(self, principal), fields(role = %principal.role))]
  pub async fn accept(&self, principal: &Principal, id: OrderId, prep_override: Option<u32>) -> OrderResult<Order> {
    principal.require_staff()?;
    let current = self.load(id).await?;
    ensure_transition(current.status, OrderStatus::Received)?;

    let prep = positive_minutes(prep_override.unwrap_or(current.prep_time_minutes))?;
    let now = self.clock.now();
    let update = OrderUpdate::transition(StatusGuard::Exactly(OrderStatus::Pending), OrderStatus::Received, now, None)
      .with_prep_time(prep)
      .with_eta(EtaUpdate::Set(now + Duration::minutes(i64::from(prep))));
    let accepted = self.store.apply(id, update).await?;
    info!(order_id = %id, prep_minutes = prep, "Order accepted.");
    Ok(accepted)
  }

  /// `pending|received → cancelled` by staff. Never touches refund fields.
  #[instrument(skip(self, principal, note), fields(role = %principal.role))]
  pub async fn reject(&self, principal: &Principal, id: OrderId, note: Option<String>) -> OrderResult<Order> {
    principal.require_staff()?;
    let current = self.load(id).await?;
    ensure_transition(current.status, OrderStatus::Cancelled)?;

    let guard = StatusGuard::OneOf(vec![OrderStatus::Pending, OrderStatus::Received]);
    let update = OrderUpdate::transition(guard, OrderStatus::Cancelled, self.clock.now(), note);
    let rejected = self.store.apply(id, update).await?;
    info!(order_id = %id, "Order rejected.");
    Ok(rejected)
  }

  /// One step along `received → preparing → ready → completed`.
  #[instrument(skip(self, principal), fields(role = %principal.role))]
  pub async fn advance(&self, principal: &Principal, id: OrderId) -> OrderResult<Order> {
    principal.require_staff()?;
    let current = self.load(id).await?;
    let next = current.status.next_step().ok_or(OrderError::InvalidTransition {
      from: current.status,
      to: current.status,
    })?;
    self.step(id, current.status, next).await
  }

  /// Moves to an explicitly named status.
  ///
  /// `received` from `pending` is an accept with the stored prep time, `cancelled`
  /// is a reject; anything else must be exactly the next forward step.
  pub async fn advance_to(&self, principal: &Principal, id: OrderId, target: OrderStatus) -> OrderResult<Order> {
    principal.require_staff()?;
    let current = self.load(id).await?;
    match (current.status, target) {
      (OrderStatus::Pending, OrderStatus::Received) => self.accept(principal, id, None).await,
      (_, OrderStatus::Cancelled) => self.reject(principal, id, None).await,
      (from, to) if from.next_step() == Some(to) => self.step(id, from, to).await,
      (from, to) => Err(OrderError::InvalidTransition { from, to }),
    }
  }

  async fn step(&self, id: OrderId, from: OrderStatus, to: OrderStatus) -> OrderResult<Order> {
    ensure_transition(from, to)?;
    let update = OrderUpdate::transition(StatusGuard::Exactly(from), to, self.clock.now(), None);
    let moved = self.store.apply(id, update).await?;
    info!(order_id = %id, %from, %to, "Order advanced.");
    Ok(moved)
  }

  /// Changes the prep time of a live order and re-bases an existing estimate on `now`.
  #[instrument(skip(self, principal), fields(role = %principal.role))]
  pub async fn set_prep_time(&self, principal: &Principal, id: OrderId, minutes: u32) -> OrderResult<Order> {
    principal.require_staff()?;
    let minutes = positive_minutes(minutes)?;
    let now = self.clock.now();
    let update = OrderUpdate::guarded(StatusGuard::non_terminal(), now)
      .with_prep_time(minutes)
      .with_eta(EtaUpdate::RebaseIfSet(now + Duration::minutes(i64::from(minutes))));
    self.store.apply(id, update).await
  }

  /// Self-service cancellation with refund.
  ///
  /// Checks, in order: caller is not staff, the claimed email matches the order
  /// (for signed-in customers, so must the account email), the order is still `pending` or `received`, and at most the cancel window has
  /// passed since `created_at`. The refund is issued before the status changes; a
  /// refund failure leaves the order untouched.
  #[instrument(skip(self, principal, order, claimed_email), fields(role = %principal.role, order = %order))]
  pub async fn customer_cancel(&self, principal: &Principal, order: OrderRef, claimed_email: &str) -> OrderResult<Order> {
    if principal.is_staff() {
      return Err(OrderError::unauthorized("staff cancel orders by rejecting them"));
    }
    let current = self.resolve(&order).await?;
    if claimed_email.trim().is_empty() || !current.email_matches(claimed_email) {
      return Err(OrderError::unauthorized("email does not match order"));
    }
    if principal.role == Role::Customer && !principal.email.as_deref().is_some_and(|e| current.email_matches(e)) {
      return Err(OrderError::unauthorized("signed-in account does not own this order"));
    }
    if !matches!(current.status, OrderStatus::Pending | OrderStatus::Received) {
      return Err(OrderError::AlreadyAccepted { status: current.status });
    }

    let now = self.clock.now();
    let elapsed = now - current.created_at;
    if elapsed > self.policy.cancel_window {
      return Err(OrderError::WindowExpired {
        elapsed_secs: elapsed.num_seconds(),
      });
    }

    let refund_id = if self.policy.is_sandbox_session(current.stripe_session_id.as_deref()) {
      SANDBOX_REFUND_ID.to_string()
    } else {
      let payment_intent_id = current.payment_intent_id.clone().ok_or_else(|| {
        OrderError::upstream("payments", anyhow::anyhow!("payment reference not found for refund"))
      })?;
      let receipt = self
        .payments
        .refund(&RefundRequest {
          payment_intent_id,
          amount_cents: None,
        })
        .await
        .map_err(|e| {
          warn!(order_id = %current.id, error = %e, "Refund failed, order left unchanged.");
          e
        })?;
      receipt.id
    };

    let guard = StatusGuard::OneOf(vec![OrderStatus::Pending, OrderStatus::Received]);
    let update = OrderUpdate::transition(guard, OrderStatus::Cancelled, now, Some(CUSTOMER_CANCEL_NOTE.to_string()))
      .with_refund(RefundStamp {
        refund_id: refund_id.clone(),
        refunded_at: now,
      });
    let cancelled = self.store.apply(current.id, update).await?;
    info!(order_id = %cancelled.id, %refund_id, "Order cancelled by customer.");
    Ok(cancelled)
  }
}
