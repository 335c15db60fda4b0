// comanda/src/approval/workflow.rs

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::alarm::{AlarmChange, AlertSink, PendingAlarm, ALARM_INTERVAL};
use super::snapshot::SnapshotTracker;
use super::StaffOrders;
use crate::error::{OrderError, OrderResult};
use crate::model::{Order, OrderId, OrderStatus};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const AUTO_REJECT_NOTE: &str = "Automatically rejected: not accepting orders";

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
  pub new_pending: Vec<OrderId>,
  pub auto_rejected: Vec<OrderId>,
  pub auto_reject_failures: Vec<(OrderId, String)>,
  pub pending_count: usize,
  pub alarm: AlarmChange,
}

/// Aggregate result of Accept All.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
  pub succeeded: Vec<OrderId>,
  pub failed: Vec<(OrderId, String)>,
}

impl BulkReport {
  pub fn is_clean(&self) -> bool {
    self.failed.is_empty()
  }

  /// e.g. "Accepted 3 of 4 orders; failed: <id> (reason)"
  pub fn summary(&self) -> String {
    let total = self.succeeded.len() + self.failed.len();
    let mut text = format!("Accepted {} of {} orders", self.succeeded.len(), total);
    if !self.failed.is_empty() {
      let failures: Vec<String> = self.failed.iter().map(|(id, why)| format!("{} ({})", id, why)).collect();
      text.push_str("; failed: ");
      text.push_str(&failures.join(", "));
    }
    text
  }
}

#[derive(Debug)]
struct WorkflowState {
  tracker: SnapshotTracker,
  alarm: PendingAlarm,
  auto_rejected: HashSet<OrderId>,
  accepting: bool,
}

/// A polling staff client.
///
/// State lives behind a blocking mutex that is never held across an await;
/// remote calls happen between short critical sections.
pub struct ApprovalWorkflow {
  staff: Arc<dyn StaffOrders>,
  alerts: Arc<dyn AlertSink>,
  state: Mutex<WorkflowState>,
  poll_interval: Duration,
  alarm_interval: Duration,
}

impl std::fmt::Debug for ApprovalWorkflow {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApprovalWorkflow")
      .field("state", &self.state)
      .field("poll_interval", &self.poll_interval)
      .finish_non_exhaustive()
  }
}

impl ApprovalWorkflow {
  pub fn new(staff: Arc<dyn StaffOrders>, alerts: Arc<dyn AlertSink>) -> Self {
    Self {
      staff,
      alerts,
      state: Mutex::new(WorkflowState {
        tracker: SnapshotTracker::new(),
        alarm: PendingAlarm::new(),
        auto_rejected: HashSet::new(),
        accepting: true,
      }),
      poll_interval: POLL_INTERVAL,
      alarm_interval: ALARM_INTERVAL,
    }
  }

  pub fn with_intervals(mut self, poll_interval: Duration, alarm_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self.alarm_interval = alarm_interval;
    self
  }

  /// Starts with the gate in a known position, e.g. one restored from disk.
  pub fn with_accepting(self, accepting: bool) -> Self {
    self.state.lock().accepting = accepting;
    self
  }

  pub fn is_accepting(&self) -> bool {
    self.state.lock().accepting
  }

  /// Flips the gate. Returns the previous value. Takes effect on the next tick.
  pub fn set_accepting(&self, accepting: bool) -> bool {
    let previous = std::mem::replace(&mut self.state.lock().accepting, accepting);
    if previous != accepting {
      info!(accepting, "Accepting-orders toggle changed.");
    }
    previous
  }

  pub fn orders(&self) -> Vec<Order> {
    self.state.lock().tracker.orders().to_vec()
  }

  pub fn pending_count(&self) -> usize {
    self.state.lock().tracker.pending_count()
  }

  pub fn alarm_active(&self) -> bool {
    self.state.lock().alarm.is_active()
  }

  fn observe(&self, orders: Vec<Order>) -> Vec<OrderId> {
    let mut state = self.state.lock();
    let fresh = state.tracker.observe(orders);
    for order in &fresh {
      self.alerts.new_pending(order);
    }
    fresh.into_iter().map(|o| o.id).collect()
  }

  fn update_alarm(&self) -> (usize, AlarmChange) {
    let mut state = self.state.lock();
    let pending = state.tracker.pending_count();
    let change = state.alarm.update(pending);
    drop(state);
    match change {
      AlarmChange::Started => self.alerts.chime(pending),
      AlarmChange::Stopped => self.alerts.silenced(),
      AlarmChange::Unchanged => {}
    }
    (pending, change)
  }

  /// One poll: fetch, alert on newly pending orders, auto-reject while paused,
  /// then bring the alarm in line with what is still pending.
  pub async fn tick(&self) -> OrderResult<TickReport> {
    let orders = self.staff.fetch_all().await?;
    let mut new_pending = self.observe(orders);

    let to_reject: Vec<OrderId> = {
      let state = self.state.lock();
      if state.accepting {
        Vec::new()
      } else {
        state
          .tracker
          .pending_ids()
          .into_iter()
          .filter(|id| !state.auto_rejected.contains(id))
          .collect()
      }
    };

    let mut auto_rejected = Vec::new();
    let mut auto_reject_failures = Vec::new();
    for id in to_reject {
      match self.staff.reject(id, Some(AUTO_REJECT_NOTE.to_string())).await {
        Ok(_) => {
          self.state.lock().auto_rejected.insert(id);
          auto_rejected.push(id);
        }
        Err(e) => {
          warn!(order_id = %id, error = %e, "Auto-reject failed, will retry next tick.");
          auto_reject_failures.push((id, e.to_string()));
        }
      }
    }
    if !auto_rejected.is_empty() {
      info!(count = auto_rejected.len(), "Auto-rejected orders while paused.");
      let refreshed = self.staff.fetch_all().await?;
      new_pending.extend(self.observe(refreshed));
    }

    let (pending_count, alarm) = self.update_alarm();
    debug!(pending_count, new = new_pending.len(), "Poll tick done.");
    Ok(TickReport {
      new_pending,
      auto_rejected,
      auto_reject_failures,
      pending_count,
      alarm,
    })
  }

  /// One alarm repetition. Returns whether the alarm sounded.
  pub fn ring(&self) -> bool {
    let pending = {
      let state = self.state.lock();
      if !state.alarm.is_active() {
        return false;
      }
      state.alarm.pending()
    };
    self.alerts.chime(pending);
    true
  }

  /// Accepts every order that is pending in the current snapshot, concurrently.
  ///
  /// Local statuses flip to `received` up front and are rolled back one by one
  /// for the calls that fail. The next tick re-fetches the authoritative state.
  pub async fn accept_all(&self, prep_time_minutes: Option<u32>) -> OrderResult<BulkReport> {
    let ids = {
      let mut state = self.state.lock();
      if !state.accepting {
        return Err(OrderError::Validation("not accepting orders".to_string()));
      }
      let ids = state.tracker.pending_ids();
      for id in &ids {
        state.tracker.set_local_status(*id, OrderStatus::Received);
      }
      ids
    };
    if ids.is_empty() {
      return Ok(BulkReport::default());
    }

    let results = join_all(ids.iter().map(|id| self.staff.accept(*id, prep_time_minutes))).await;

    let mut report = BulkReport::default();
    {
      let mut state = self.state.lock();
      for (id, result) in ids.into_iter().zip(results) {
        match result {
          Ok(_) => report.succeeded.push(id),
          Err(e) => {
            state.tracker.set_local_status(id, OrderStatus::Pending);
            report.failed.push((id, e.to_string()));
          }
        }
      }
    }
    self.update_alarm();

    if report.is_clean() {
      info!(count = report.succeeded.len(), "Accepted all pending orders.");
    } else {
      warn!(summary = %report.summary(), "Accept All finished with failures.");
    }
    Ok(report)
  }

  /// Polls and rings until `shutdown` flips to `true` or its sender is dropped.
  pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
    let mut poll = tokio::time::interval(self.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ring = tokio::time::interval(self.alarm_interval);
    ring.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(poll_secs = self.poll_interval.as_secs_f64(), "Approval workflow running.");
    loop {
      tokio::select! {
        _ = poll.tick() => {
          if let Err(e) = self.tick().await {
            warn!(error = %e, "Order poll failed.");
          }
        }
        _ = ring.tick() => {
          self.ring();
        }
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }
    info!("Approval workflow stopped.");
  }
}
