// comanda/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::model::OrderStatus;

#[derive(Debug, Error)]
pub enum OrderError {
  #[error("Unauthorized: {reason}")]
  Unauthorized { reason: String },

  #[error("Order not found: {lookup}")]
  NotFound { lookup: String },

  #[error("Invalid transition from '{from}' to '{to}'")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("Cancellation window expired ({elapsed_secs}s since the order was placed)")]
  WindowExpired { elapsed_secs: i64 },

  #[error("Order can no longer be cancelled: it is already '{status}'")]
  AlreadyAccepted { status: OrderStatus },

  /// Control-flow signal from `create`: an order with this session id already exists.
  #[error("An order for payment session '{session_id}' already exists")]
  DuplicateKey { session_id: String },

  /// A remote order service refused the change against the order's current state.
  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Webhook signature verification failed: {0}")]
  InvalidSignature(String),

  #[error("Malformed payload: {0}")]
  MalformedPayload(String),

  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Upstream service '{service}' unavailable. Source: {source}")]
  UpstreamUnavailable {
    service: &'static str,
    #[source]
    source: AnyhowError,
  },

  #[error("Order storage failure. Source: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },

  #[error("Pipeline step '{step_name}' has no handlers and is not optional")]
  PipelineMisconfigured { step_name: String },
}

impl OrderError {
  pub fn unauthorized(reason: impl Into<String>) -> Self {
    OrderError::Unauthorized { reason: reason.into() }
  }

  pub fn not_found(lookup: impl Into<String>) -> Self {
    OrderError::NotFound { lookup: lookup.into() }
  }

  pub fn upstream(service: &'static str, source: impl Into<AnyhowError>) -> Self {
    OrderError::UpstreamUnavailable {
      service,
      source: source.into(),
    }
  }

  /// True for the duplicate-session signal that intake treats as success.
  pub fn is_duplicate(&self) -> bool {
    matches!(self, OrderError::DuplicateKey { .. })
  }
}

// Opaque failures from a backing store surface as `Storage`.
impl From<AnyhowError> for OrderError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<OrderError>() {
      Ok(order_err) => order_err,
      Err(other) => OrderError::Storage { source: other },
    }
  }
}

pub type OrderResult<T, E = OrderError> = std::result::Result<T, E>;
