// comanda_server/src/web/extractors.rs

//! Bearer-token extractors. Handlers take `Caller` when a session is required
//! and `MaybeCaller` when it only narrows what they do.

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use comanda::{OrderError, Principal};
use futures_util::future::{ready, Ready};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Principal>);

fn principal_from(req: &HttpRequest) -> Result<Option<Principal>, AppError> {
  let Some(raw) = req.headers().get(AUTHORIZATION) else {
    return Ok(None);
  };
  let raw = raw
    .to_str()
    .map_err(|_| AppError::Auth("Authorization header is not valid text".to_string()))?;
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("application state not configured".to_string()))?;
  match state.verifier.verify(raw) {
    Ok(principal) => Ok(Some(principal)),
    Err(OrderError::Unauthorized { reason }) => Err(AppError::Auth(reason)),
    Err(other) => Err(other.into()),
  }
}

impl FromRequest for Caller {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(principal_from(req).and_then(|p| {
      p.map(Caller)
        .ok_or_else(|| AppError::Auth("Missing authorization token".to_string()))
    }))
  }
}

impl FromRequest for MaybeCaller {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(principal_from(req).map(MaybeCaller))
  }
}
