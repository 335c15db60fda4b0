// comanda_server/src/web/handlers/orders_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use comanda::intake::sandbox_session_id;
use comanda::model::{items_total, CustomerSnapshot};
use comanda::store::OrderQuery;
use comanda::{LineItem, NewOrder, OrderId, OrderRef, OrderStatus, Principal};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{Caller, MaybeCaller};

pub const DEV_ORDER_HEADER: &str = "x-dev-order";
pub const DEV_ORDER_NOTE: &str = "Test order created";

// --- GET ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQueryParams {
  pub order_id: Option<OrderId>,
  pub session_id: Option<String>,
  pub guest_id: Option<String>,
  pub email: Option<String>,
  pub admin: Option<bool>,
}

impl OrdersQueryParams {
  /// First match wins: admin listing, order id, session id, guest id, email.
  pub fn to_query(&self) -> Result<OrderQuery, AppError> {
    let non_empty = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    if self.admin == Some(true) {
      Ok(OrderQuery::recent())
    } else if let Some(id) = self.order_id {
      Ok(OrderQuery::ById(id))
    } else if let Some(session_id) = non_empty(&self.session_id) {
      Ok(OrderQuery::BySession(session_id))
    } else if let Some(guest_id) = non_empty(&self.guest_id) {
      Ok(OrderQuery::ByGuest(guest_id))
    } else if let Some(email) = non_empty(&self.email) {
      Ok(OrderQuery::ByEmail(email))
    } else {
      Err(AppError::Validation(
        "Must provide guestId, email, orderId, or sessionId".to_string(),
      ))
    }
  }
}

#[instrument(name = "handler::list_orders", skip_all, fields(role = %caller.0.role))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  params: web::Query<OrdersQueryParams>,
) -> Result<HttpResponse, AppError> {
  let query = params.to_query()?;
  let orders = app_state.lifecycle.orders(&caller.0, &query).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

// --- POST ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
  pub session_id: String,
  pub customer_email: String,
}

fn default_qty() -> u32 {
  1
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DevOrderItem {
  pub name: String,
  #[serde(alias = "quantity", default = "default_qty")]
  pub qty: u32,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
  #[serde(default)]
  pub meat_type: Option<String>,
  #[serde(default)]
  pub sauce: Option<String>,
  #[serde(default)]
  pub toppings: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DevOrderRequest {
  pub items: Vec<DevOrderItem>,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub customer_name: Option<String>,
  #[serde(default)]
  pub customer_phone: Option<String>,
  #[serde(default)]
  pub guest_id: Option<String>,
  #[serde(default, with = "rust_decimal::serde::float_option")]
  pub total_amount: Option<Decimal>,
}

impl DevOrderRequest {
  fn into_new_order(self, session_id: String) -> Result<NewOrder, AppError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let items: Vec<LineItem> = self
      .items
      .into_iter()
      .map(|item| LineItem {
        name: item.name,
        qty: item.qty,
        price: item.price,
        meat_type: item.meat_type,
        sauce: item.sauce,
        toppings: item.toppings,
      })
      .collect();
    let total_amount = match self.total_amount {
      Some(total) => total,
      None => items_total(&items)?,
    };
    Ok(NewOrder {
      stripe_session_id: Some(session_id),
      payment_intent_id: None,
      user_id: None,
      guest_id: non_empty(self.guest_id),
      customer: CustomerSnapshot {
        name: non_empty(self.customer_name),
        email: non_empty(self.customer_email),
        phone: non_empty(self.customer_phone),
      },
      items,
      total_amount,
      prep_time_minutes: None,
    })
  }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, AppError> {
  serde_json::from_value(body).map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

/// `action: "cancel"` is the customer self-cancel; any other body is a
/// development order, refused in production and without the dev header.
#[instrument(name = "handler::post_orders", skip_all)]
pub async fn post_orders_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  caller: MaybeCaller,
  body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
  let body = body.into_inner();
  if body.get("action").and_then(|a| a.as_str()) == Some("cancel") {
    let cancel: CancelRequest = parse_body(body)?;
    return cancel_order(&app_state, caller.0, cancel).await;
  }

  if app_state.config.is_production() {
    return Err(AppError::Forbidden("Not allowed in production".to_string()));
  }
  let dev_header = req.headers().get(DEV_ORDER_HEADER).and_then(|h| h.to_str().ok());
  if dev_header != Some("true") {
    return Err(AppError::Forbidden("Missing dev header".to_string()));
  }
  let mut dev: DevOrderRequest = parse_body(body)?;
  if dev.items.is_empty() {
    return Err(AppError::Validation("Items are required".to_string()));
  }
  if let Some(principal) = caller.0.filter(|p| p.role == comanda::Role::Guest) {
    dev.guest_id.get_or_insert(principal.subject_id);
  }

  let session_id = sandbox_session_id(app_state.clock.now());
  let order = app_state
    .lifecycle
    .create(dev.into_new_order(session_id)?, Some(DEV_ORDER_NOTE.to_string()))
    .await?;
  info!(order_id = %order.id, "Development order created.");
  Ok(HttpResponse::Created().json(json!({
    "orderId": order.id,
    "stripeSessionId": order.stripe_session_id,
  })))
}

async fn cancel_order(
  app_state: &AppState,
  caller: Option<Principal>,
  cancel: CancelRequest,
) -> Result<HttpResponse, AppError> {
  if cancel.session_id.trim().is_empty() || cancel.customer_email.trim().is_empty() {
    return Err(AppError::Validation("sessionId and customerEmail are required".to_string()));
  }
  // The matching email is the proof of ownership; a token is optional here.
  let principal = caller.unwrap_or_else(|| Principal::guest("anonymous"));
  let cancelled = app_state
    .lifecycle
    .customer_cancel(&principal, OrderRef::Session(cancel.session_id), &cancel.customer_email)
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "refundId": cancelled.refund_id,
    "order": cancelled,
  })))
}

// --- PUT ---

#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StaffAction {
  Accept {
    #[serde(rename = "orderId")]
    order_id: OrderId,
    #[serde(rename = "prepTimeMinutes", default)]
    prep_time_minutes: Option<u32>,
  },
  Reject {
    #[serde(rename = "orderId")]
    order_id: OrderId,
    #[serde(default)]
    note: Option<String>,
  },
  Advance {
    #[serde(rename = "orderId")]
    order_id: OrderId,
  },
  SetStatus {
    #[serde(rename = "orderId")]
    order_id: OrderId,
    status: OrderStatus,
  },
  SetPrepTime {
    #[serde(rename = "orderId")]
    order_id: OrderId,
    #[serde(rename = "prepTimeMinutes")]
    prep_time_minutes: u32,
  },
}

impl StaffAction {
  pub fn order_id(&self) -> OrderId {
    match self {
      StaffAction::Accept { order_id, .. }
      | StaffAction::Reject { order_id, .. }
      | StaffAction::Advance { order_id }
      | StaffAction::SetStatus { order_id, .. }
      | StaffAction::SetPrepTime { order_id, .. } => *order_id,
    }
  }
}

#[instrument(name = "handler::update_order", skip_all, fields(order_id = %action.order_id(), role = %caller.0.role))]
pub async fn update_order_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  action: web::Json<StaffAction>,
) -> Result<HttpResponse, AppError> {
  let principal = caller.0;
  if !principal.is_staff() {
    warn!("Non-staff caller attempted an order update.");
    return Err(AppError::Forbidden("Staff session required".to_string()));
  }
  let lifecycle = &app_state.lifecycle;
  let order = match action.into_inner() {
    StaffAction::Accept {
      order_id,
      prep_time_minutes,
    } => lifecycle.accept(&principal, order_id, prep_time_minutes).await?,
    StaffAction::Reject { order_id, note } => lifecycle.reject(&principal, order_id, note).await?,
    StaffAction::Advance { order_id } => lifecycle.advance(&principal, order_id).await?,
    StaffAction::SetStatus { order_id, status } => lifecycle.advance_to(&principal, order_id, status).await?,
    StaffAction::SetPrepTime {
      order_id,
      prep_time_minutes,
    } => lifecycle.set_prep_time(&principal, order_id, prep_time_minutes).await?,
  };
  Ok(HttpResponse::Ok().json(json!({ "success": true, "order": order })))
}
