// comanda_server/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use comanda::Role;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::extractors::MaybeCaller;

#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum AuthRequest {
  Guest,
  AdminLogin { password: String },
  ChefLogin { password: String },
  Verify,
}

impl AuthRequest {
  fn label(&self) -> &'static str {
    match self {
      AuthRequest::Guest => "guest",
      AuthRequest::AdminLogin { .. } => "admin-login",
      AuthRequest::ChefLogin { .. } => "chef-login",
      AuthRequest::Verify => "verify",
    }
  }
}

#[instrument(name = "handler::auth", skip_all, fields(action = req_payload.label()))]
pub async fn auth_handler(
  app_state: web::Data<AppState>,
  caller: MaybeCaller,
  req_payload: web::Json<AuthRequest>,
) -> Result<HttpResponse, AppError> {
  match req_payload.into_inner() {
    AuthRequest::Guest => {
      let (token, principal) = app_state.identity.issue_guest()?;
      info!(guest_id = %principal.subject_id, "Guest session started.");
      Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "guestId": principal.subject_id,
        "type": "guest",
      })))
    }
    AuthRequest::AdminLogin { password } => {
      let token = auth_service::staff_login(&app_state.config, &app_state.identity, Role::Admin, &password)?;
      Ok(HttpResponse::Ok().json(json!({ "token": token, "type": "admin" })))
    }
    AuthRequest::ChefLogin { password } => {
      let token = auth_service::staff_login(&app_state.config, &app_state.identity, Role::Staff, &password)?;
      Ok(HttpResponse::Ok().json(json!({ "token": token, "type": "chef" })))
    }
    AuthRequest::Verify => {
      let principal = caller
        .0
        .ok_or_else(|| AppError::Auth("Missing authorization token".to_string()))?;
      Ok(HttpResponse::Ok().json(json!({ "valid": true, "principal": principal })))
    }
  }
}
