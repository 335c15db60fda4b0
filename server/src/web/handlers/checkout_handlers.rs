// comanda_server/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use comanda::payment::{build_checkout_request, CheckoutDraft};
use comanda::Role;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::MaybeCaller;

/// Opens a hosted checkout session for the cart. The order itself is only
/// created once the processor confirms payment through the webhook.
#[instrument(name = "handler::start_checkout", skip_all, fields(items = req_payload.items.len()))]
pub async fn start_checkout_handler(
  app_state: web::Data<AppState>,
  caller: MaybeCaller,
  req_payload: web::Json<CheckoutDraft>,
) -> Result<HttpResponse, AppError> {
  let mut draft = req_payload.into_inner();

  // A session token fills in linkage the client left out.
  if let Some(principal) = caller.0 {
    match principal.role {
      Role::Guest if draft.guest_id.is_none() => draft.guest_id = Some(principal.subject_id),
      Role::Customer => {
        draft.user_id = Some(principal.subject_id);
        if draft.customer_email.is_none() {
          draft.customer_email = principal.email;
        }
      }
      _ => {}
    }
  }

  let request = build_checkout_request(&draft, &app_state.config.app_base_url)?;
  let session = app_state.gateway.create_checkout_session(&request).await?;
  info!(session_id = %session.id, "Checkout started.");
  Ok(HttpResponse::Ok().json(json!({ "sessionId": session.id, "url": session.url })))
}
