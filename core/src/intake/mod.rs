// comanda/src/intake/mod.rs

//! Payment intake: signed "checkout completed" webhooks in, at most one order out.

pub mod chunking;
pub mod event;
pub mod pipeline;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::OrderId;

pub use pipeline::{IntakeContext, IntakeSettings, PaymentIntake, INTAKE_STEPS, PAYMENT_RECEIVED_NOTE};

/// What happened to one webhook delivery. Every variant is acknowledged as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntakeOutcome {
  Created { order_id: OrderId },
  /// The session already has an order; nothing was written and no email sent.
  Deduplicated { session_id: String },
  /// Not an event type intake acts on.
  Ignored { event_type: String },
}

impl IntakeOutcome {
  pub fn is_deduplicated(&self) -> bool {
    matches!(self, IntakeOutcome::Deduplicated { .. })
  }
}

/// A fresh sandbox session id: `test_<millis>_<7 random chars>`.
/// Orders carrying one are refunded without calling the processor.
pub fn sandbox_session_id(now: DateTime<Utc>) -> String {
  let random = Uuid::new_v4().simple().to_string();
  format!("test_{}_{}", now.timestamp_millis(), &random[..7])
}
