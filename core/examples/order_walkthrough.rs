// comanda/examples/order_walkthrough.rs

//! Signs a checkout webhook, feeds it through intake twice, then walks the
//! order through the kitchen with an in-memory store.

use async_trait::async_trait;
use comanda::intake::IntakeSettings;
use comanda::payment::{sign_payload, CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt, RefundRequest};
use comanda::store::InMemoryOrderStore;
use comanda::{OrderLifecycle, OrderResult, OrderStore, PaymentIntake, Principal, SystemClock};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const SECRET: &str = "whsec_walkthrough";

#[derive(Debug)]
struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
  async fn create_checkout_session(&self, _request: &CheckoutRequest) -> OrderResult<CheckoutSession> {
    Ok(CheckoutSession {
      id: "cs_offline".to_string(),
      url: None,
    })
  }

  async fn refund(&self, request: &RefundRequest) -> OrderResult<RefundReceipt> {
    Ok(RefundReceipt {
      id: format!("re_{}", request.payment_intent_id),
    })
  }
}

#[tokio::main]
async fn main() -> OrderResult<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Order Walkthrough ---");

  let store = Arc::new(InMemoryOrderStore::new());
  let clock = Arc::new(SystemClock);
  let lifecycle = OrderLifecycle::new(store.clone(), Arc::new(OfflineGateway), clock.clone());
  let intake = PaymentIntake::new(lifecycle.clone(), None, clock, IntakeSettings::new(SECRET));
  info!(steps = ?intake.step_names(), "Intake pipeline");

  let body = serde_json::to_vec(&json!({
    "type": "checkout.session.completed",
    "data": { "object": {
      "id": "cs_walkthrough",
      "payment_intent": "pi_walkthrough",
      "customer_email": "ana@example.com",
      "amount_total": 1250,
      "metadata": {
        "orderItems": "[{\"name\":\"Burrito\",\"qty\":1,\"price\":12.5,\"meatType\":\"Carnitas\"}]",
        "customerName": "Ana",
        "guestId": "guest_walkthrough"
      }
    }}
  }))
  .map_err(|e| comanda::OrderError::MalformedPayload(e.to_string()))?;

  // Processors retry; the second delivery is a no-op.
  for _ in 0..2 {
    let header = sign_payload(&body, SECRET, chrono::Utc::now().timestamp())?;
    let outcome = intake.handle(body.clone(), Some(header)).await?;
    info!(?outcome, "Delivered");
  }

  let order = store
    .get_by_session("cs_walkthrough")
    .await?
    .ok_or_else(|| comanda::OrderError::not_found("session cs_walkthrough"))?;

  let chef = Principal::kitchen();
  lifecycle.accept(&chef, order.id, Some(10)).await?;
  for _ in 0..3 {
    let moved = lifecycle.advance(&chef, order.id).await?;
    info!(status = %moved.status, "Advanced");
  }

  let done = lifecycle.find_one(&chef, &comanda::OrderRef::Id(order.id)).await?;
  for entry in &done.status_history {
    info!(status = %entry.status, at = %entry.timestamp, note = ?entry.note, "History");
  }
  Ok(())
}
