// comanda_server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use comanda::OrderError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  /// Missing or invalid credentials.
  #[error("Authentication Failed: {0}")]
  Auth(String),

  /// Authenticated, but not allowed to do this.
  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Order Error: {source}")]
  Order {
    #[from]
    source: OrderError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<OrderError>() {
      Ok(order_err) => AppError::Order { source: order_err },
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(other) => AppError::Internal(other.to_string()),
      },
    }
  }
}

/// Status code and client-facing message for an engine error.
fn order_error_parts(err: &OrderError) -> (StatusCode, String) {
  match err {
    OrderError::Unauthorized { reason } => (StatusCode::FORBIDDEN, reason.clone()),
    OrderError::NotFound { .. } => (StatusCode::NOT_FOUND, "Order not found".to_string()),
    OrderError::InvalidTransition { from, to } => (
      StatusCode::CONFLICT,
      format!("Order is '{}' and cannot move to '{}'", from, to),
    ),
    OrderError::DuplicateKey { .. } => (StatusCode::CONFLICT, err.to_string()),
    OrderError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
    OrderError::WindowExpired { .. } => (
      StatusCode::BAD_REQUEST,
      "Cancellation window expired. Orders can only be cancelled within 2 minutes of placing them.".to_string(),
    ),
    OrderError::AlreadyAccepted { .. } => (
      StatusCode::BAD_REQUEST,
      "Order cannot be cancelled after the kitchen has started on it.".to_string(),
    ),
    OrderError::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "Webhook signature verification failed".to_string()),
    OrderError::MalformedPayload(m) | OrderError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
    OrderError::UpstreamUnavailable { service, .. } => (
      StatusCode::BAD_GATEWAY,
      format!("Upstream service '{}' is unavailable, please try again", service),
    ),
    OrderError::Storage { .. } | OrderError::PipelineMisconfigured { .. } => {
      (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Order { source } => order_error_parts(source).0,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let message = match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::Forbidden(m) | AppError::NotFound(m) => m.clone(),
      AppError::Order { source } => order_error_parts(source).1,
      AppError::Config(_) => "Configuration issue".to_string(),
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Internal(_) => "An internal error occurred".to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use comanda::OrderStatus;

  fn status_of(err: OrderError) -> StatusCode {
    AppError::from(err).status_code()
  }

  #[test]
  fn engine_errors_map_to_http_statuses() {
    assert_eq!(status_of(OrderError::unauthorized("nope")), StatusCode::FORBIDDEN);
    assert_eq!(status_of(OrderError::not_found("order x")), StatusCode::NOT_FOUND);
    assert_eq!(
      status_of(OrderError::InvalidTransition {
        from: OrderStatus::Ready,
        to: OrderStatus::Received
      }),
      StatusCode::CONFLICT
    );
    assert_eq!(status_of(OrderError::Conflict("already received".into())), StatusCode::CONFLICT);
    assert_eq!(status_of(OrderError::WindowExpired { elapsed_secs: 121 }), StatusCode::BAD_REQUEST);
    assert_eq!(status_of(OrderError::InvalidSignature("bad".into())), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_of(OrderError::upstream("payments", anyhow::anyhow!("timeout"))),
      StatusCode::BAD_GATEWAY
    );
    assert_eq!(
      status_of(OrderError::Storage {
        source: anyhow::anyhow!("disk")
      }),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn anyhow_wrapping_an_order_error_keeps_its_status() {
    let wrapped = anyhow::Error::new(OrderError::not_found("order y"));
    assert_eq!(AppError::from(wrapped).status_code(), StatusCode::NOT_FOUND);
  }
}
