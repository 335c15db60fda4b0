// comanda_server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use comanda::IntakeOutcome;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Payment processor notifications. The body must reach intake byte-for-byte
/// so the signature can be checked.
#[instrument(name = "handler::stripe_webhook", skip_all, fields(payload_bytes = body.len()))]
pub async fn stripe_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature_header = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|h| h.to_str().ok())
    .map(String::from);
  if signature_header.is_none() {
    warn!("Webhook delivery without a signature header.");
  }

  let outcome = app_state.intake.handle(body.to_vec(), signature_header).await?;
  info!(?outcome, "Webhook acknowledged.");
  let response = match outcome {
    IntakeOutcome::Created { order_id } => json!({ "received": true, "orderId": order_id }),
    IntakeOutcome::Deduplicated { .. } => json!({ "received": true, "deduped": true }),
    IntakeOutcome::Ignored { event_type } => json!({ "received": true, "ignored": event_type }),
  };
  Ok(HttpResponse::Ok().json(response))
}
