// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use comanda::intake::IntakeSettings;
use comanda::mailer::{Mailer, OrderConfirmation};
use comanda::model::CustomerSnapshot;
use comanda::payment::{sign_payload, CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt, RefundRequest};
use comanda::store::InMemoryOrderStore;
use comanda::{LineItem, ManualClock, NewOrder, OrderError, OrderLifecycle, OrderResult, PaymentIntake};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

pub const WEBHOOK_SECRET: &str = "whsec_comanda_tests";

pub fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
}

// --- Payment gateway double ---
#[derive(Debug, Default)]
pub struct FakeGateway {
  pub refunds: Mutex<Vec<RefundRequest>>,
  pub fail_refunds: AtomicBool,
  next_id: AtomicUsize,
}

impl FakeGateway {
  pub fn refund_count(&self) -> usize {
    self.refunds.lock().len()
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  async fn create_checkout_session(&self, _request: &CheckoutRequest) -> OrderResult<CheckoutSession> {
    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
    Ok(CheckoutSession {
      id: format!("cs_fake_{}", n),
      url: Some(format!("https://pay.example/cs_fake_{}", n)),
    })
  }

  async fn refund(&self, request: &RefundRequest) -> OrderResult<RefundReceipt> {
    if self.fail_refunds.load(Ordering::SeqCst) {
      return Err(OrderError::upstream("payments", anyhow::anyhow!("processor timed out")));
    }
    self.refunds.lock().push(request.clone());
    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
    Ok(RefundReceipt { id: format!("re_{}", n) })
  }
}

// --- Mailer double ---
#[derive(Debug, Default)]
pub struct FakeMailer {
  pub sent: Mutex<Vec<OrderConfirmation>>,
  pub fail: AtomicBool,
}

impl FakeMailer {
  pub fn sent_count(&self) -> usize {
    self.sent.lock().len()
  }
}

#[async_trait]
impl Mailer for FakeMailer {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> OrderResult<String> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(OrderError::upstream("email", anyhow::anyhow!("smtp relay refused")));
    }
    self.sent.lock().push(confirmation.clone());
    Ok(format!("msg_{}", confirmation.order_id))
  }
}

// --- Wiring ---
pub struct Harness {
  pub store: Arc<InMemoryOrderStore>,
  pub clock: Arc<ManualClock>,
  pub gateway: Arc<FakeGateway>,
  pub mailer: Arc<FakeMailer>,
  pub lifecycle: OrderLifecycle,
  pub intake: PaymentIntake,
}

impl Harness {
  pub fn new() -> Self {
    let store = Arc::new(InMemoryOrderStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let gateway = Arc::new(FakeGateway::default());
    let mailer = Arc::new(FakeMailer::default());
    let lifecycle = OrderLifecycle::new(store.clone(), gateway.clone(), clock.clone());
    let intake = PaymentIntake::new(
      lifecycle.clone(),
      Some(mailer.clone() as Arc<dyn Mailer>),
      clock.clone(),
      IntakeSettings::new(WEBHOOK_SECRET),
    );
    Self {
      store,
      clock,
      gateway,
      mailer,
      lifecycle,
      intake,
    }
  }

  pub fn sign(&self, body: &[u8]) -> String {
    sign_payload(body, WEBHOOK_SECRET, self.clock_now().timestamp()).unwrap()
  }

  pub fn clock_now(&self) -> DateTime<Utc> {
    use comanda::Clock;
    self.clock.now()
  }

  /// Delivers a correctly signed webhook.
  pub async fn deliver(&self, body: &[u8]) -> OrderResult<comanda::IntakeOutcome> {
    let header = self.sign(body);
    self.intake.handle(body.to_vec(), Some(header)).await
  }
}

// --- Payload builders ---
pub fn completed_event(session_id: &str, metadata: serde_json::Value, amount_total: i64) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "id": format!("evt_{}", session_id),
    "type": "checkout.session.completed",
    "data": {
      "object": {
        "id": session_id,
        "payment_intent": format!("pi_{}", session_id),
        "customer_email": "Ana@Example.com",
        "amount_total": amount_total,
        "metadata": metadata
      }
    }
  }))
  .unwrap()
}

pub fn taco_event(session_id: &str) -> Vec<u8> {
  completed_event(
    session_id,
    json!({
      "orderItems": "[{\"name\":\"Taco\",\"qty\":2,\"price\":4}]",
      "customerName": "Ana",
      "customerPhone": "555-0101",
      "guestId": "guest_abc"
    }),
    800,
  )
}

pub fn new_order(session_id: &str, email: &str) -> NewOrder {
  NewOrder {
    stripe_session_id: Some(session_id.to_string()),
    payment_intent_id: Some(format!("pi_{}", session_id)),
    user_id: None,
    guest_id: Some("guest_abc".to_string()),
    customer: CustomerSnapshot {
      name: Some("Ana".to_string()),
      email: Some(email.to_string()),
      phone: None,
    },
    items: vec![LineItem::new("Taco", 2, Decimal::new(4, 0))],
    total_amount: Decimal::new(800, 2),
    prep_time_minutes: None,
  }
}

// --- Tracing ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
