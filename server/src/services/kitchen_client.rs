// comanda_server/src/services/kitchen_client.rs

//! `StaffOrders` over the JSON API, for consoles running outside the server.

use async_trait::async_trait;
use comanda::approval::StaffOrders;
use comanda::error::{OrderError, OrderResult};
use comanda::{Order, OrderId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const SERVICE: &str = "order-api";

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
  orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
  order: Order,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: String,
}

// Maps an API refusal back onto the engine taxonomy so callers keep the reason.
fn error_for_status(status: StatusCode, message: String) -> OrderError {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OrderError::unauthorized(message),
    StatusCode::NOT_FOUND => OrderError::not_found(message),
    StatusCode::CONFLICT => OrderError::Conflict(message),
    StatusCode::BAD_REQUEST => OrderError::Validation(message),
    _ => OrderError::upstream(SERVICE, anyhow::anyhow!("{}: {}", status, message)),
  }
}

#[derive(Debug, Clone)]
pub struct HttpStaffOrders {
  client: reqwest::Client,
  api_url: String,
  token: String,
}

impl HttpStaffOrders {
  /// `api_url` is the server origin; `token` a staff session token.
  pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      api_url: api_url.into().trim_end_matches('/').to_string(),
      token: token.into(),
    }
  }

  fn orders_url(&self) -> String {
    format!("{}/api/orders", self.api_url)
  }

  async fn read<T: DeserializeOwned>(response: reqwest::Response) -> OrderResult<T> {
    let status = response.status();
    if status.is_success() {
      return response.json::<T>().await.map_err(|e| OrderError::upstream(SERVICE, e));
    }
    let message = response
      .json::<ErrorEnvelope>()
      .await
      .map(|e| e.error)
      .unwrap_or_else(|_| status.to_string());
    Err(error_for_status(status, message))
  }

  async fn put(&self, body: Value) -> OrderResult<Order> {
    let response = self
      .client
      .put(self.orders_url())
      .bearer_auth(&self.token)
      .json(&body)
      .send()
      .await
      .map_err(|e| OrderError::upstream(SERVICE, e))?;
    Ok(Self::read::<OrderEnvelope>(response).await?.order)
  }
}

#[async_trait]
impl StaffOrders for HttpStaffOrders {
  #[instrument(skip(self))]
  async fn fetch_all(&self) -> OrderResult<Vec<Order>> {
    let response = self
      .client
      .get(format!("{}?admin=true", self.orders_url()))
      .bearer_auth(&self.token)
      .send()
      .await
      .map_err(|e| OrderError::upstream(SERVICE, e))?;
    let envelope: OrdersEnvelope = Self::read(response).await?;
    debug!(count = envelope.orders.len(), "Fetched orders.");
    Ok(envelope.orders)
  }

  async fn accept(&self, id: OrderId, prep_time_minutes: Option<u32>) -> OrderResult<Order> {
    self
      .put(json!({ "action": "accept", "orderId": id, "prepTimeMinutes": prep_time_minutes }))
      .await
  }

  async fn reject(&self, id: OrderId, note: Option<String>) -> OrderResult<Order> {
    self.put(json!({ "action": "reject", "orderId": id, "note": note })).await
  }
}
