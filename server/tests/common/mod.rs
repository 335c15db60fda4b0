// tests/common/mod.rs
#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use comanda::mailer::{Mailer, OrderConfirmation};
use comanda::payment::{sign_payload, CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt, RefundRequest};
use comanda::store::InMemoryOrderStore;
use comanda::{Clock, ManualClock, OrderResult};
use comanda_server::config::AppEnv;
use comanda_server::services::auth_service::hash_password;
use comanda_server::{AppConfig, AppState};
use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

pub const WEBHOOK_SECRET: &str = "whsec_server_tests";
pub const CHEF_PASSWORD: &str = "kitchen-door";
pub const ADMIN_PASSWORD: &str = "front-of-house";

pub fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2025, 3, 14, 18, 0, 0).unwrap()
}

#[derive(Debug, Default)]
pub struct FakeGateway {
  pub sessions: AtomicUsize,
  pub refunds: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> OrderResult<CheckoutSession> {
    let n = self.sessions.fetch_add(1, Ordering::SeqCst);
    assert!(request.success_url.contains("{CHECKOUT_SESSION_ID}"));
    Ok(CheckoutSession {
      id: format!("cs_test_{}", n),
      url: Some(format!("https://pay.example/cs_test_{}", n)),
    })
  }

  async fn refund(&self, _request: &RefundRequest) -> OrderResult<RefundReceipt> {
    let n = self.refunds.fetch_add(1, Ordering::SeqCst);
    Ok(RefundReceipt { id: format!("re_{}", n) })
  }
}

#[derive(Debug, Default)]
pub struct CountingMailer {
  pub sent: AtomicUsize,
}

#[async_trait]
impl Mailer for CountingMailer {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> OrderResult<String> {
    self.sent.fetch_add(1, Ordering::SeqCst);
    Ok(format!("msg_{}", confirmation.order_id))
  }
}

pub fn test_config(app_env: AppEnv) -> AppConfig {
  AppConfig {
    server_host: "127.0.0.1".to_string(),
    server_port: 0,
    database_url: "postgres://unused".to_string(),
    app_base_url: "https://tacos.example".to_string(),
    app_env,
    jwt_secret: "server-test-secret-long-enough-for-hs256".to_string(),
    admin_password_hash: Some(hash_password(ADMIN_PASSWORD).unwrap()),
    chef_password_hash: Some(hash_password(CHEF_PASSWORD).unwrap()),
    stripe_secret_key: "sk_test_unused".to_string(),
    stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
    webhook_tolerance_secs: 300,
    resend_api_key: None,
    email_sender: "Tests <tests@example.com>".to_string(),
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<InMemoryOrderStore>,
  pub clock: Arc<ManualClock>,
  pub gateway: Arc<FakeGateway>,
  pub mailer: Arc<CountingMailer>,
}

impl TestApp {
  pub fn new(app_env: AppEnv) -> Self {
    let store = Arc::new(InMemoryOrderStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let gateway = Arc::new(FakeGateway::default());
    let mailer = Arc::new(CountingMailer::default());
    let state = AppState::new(
      Arc::new(test_config(app_env)),
      store.clone(),
      gateway.clone(),
      mailer.clone(),
      clock.clone(),
    );
    Self {
      state,
      store,
      clock,
      gateway,
      mailer,
    }
  }

  pub fn data(&self) -> web::Data<AppState> {
    web::Data::new(self.state.clone())
  }

  pub fn sign(&self, body: &[u8]) -> String {
    sign_payload(body, WEBHOOK_SECRET, self.clock.now().timestamp()).unwrap()
  }

  pub fn chef_token(&self) -> String {
    self.state.identity.issue(&comanda::Principal::kitchen()).unwrap()
  }

  pub fn guest_token(&self, guest_id: &str) -> String {
    self.state.identity.issue(&comanda::Principal::guest(guest_id)).unwrap()
  }
}

pub fn completed_event(session_id: &str, guest_id: &str) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "id": format!("evt_{}", session_id),
    "type": "checkout.session.completed",
    "data": {
      "object": {
        "id": session_id,
        "payment_intent": format!("pi_{}", session_id),
        "customer_email": "ana@example.com",
        "amount_total": 800,
        "metadata": {
          "orderItems": "[{\"name\":\"Taco\",\"qty\":2,\"price\":4}]",
          "customerName": "Ana",
          "customerPhone": "555-0101",
          "guestId": guest_id
        }
      }
    }
  }))
  .unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}

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
