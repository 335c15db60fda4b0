// tests/api_tests.rs
mod common;

use actix_web::http::StatusCode;
use actix_web::{test, App};
use chrono::Duration;
use comanda::{OrderStatus, OrderStore};
use comanda_server::config::AppEnv;
use comanda_server::web::configure_app_routes;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::atomic::Ordering;

macro_rules! app {
  ($test_app:expr) => {
    test::init_service(App::new().app_data($test_app.data()).configure(configure_app_routes)).await
  };
}

#[actix_web::test]
#[serial]
async fn health_and_guest_session() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/auth")
    .set_json(json!({ "action": "guest" }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["type"], "guest");
  let guest_id = body["guestId"].as_str().unwrap().to_string();
  assert!(guest_id.starts_with("guest_"));

  let req = test::TestRequest::post()
    .uri("/api/auth")
    .insert_header(bearer(body["token"].as_str().unwrap()))
    .set_json(json!({ "action": "verify" }))
    .to_request();
  let verified: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(verified["principal"]["role"], "guest");
  assert_eq!(verified["principal"]["subjectId"], guest_id.as_str());
}

#[actix_web::test]
#[serial]
async fn staff_login_accepts_only_the_configured_password() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);

  let req = test::TestRequest::post()
    .uri("/api/auth")
    .set_json(json!({ "action": "chef-login", "password": CHEF_PASSWORD }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["type"], "chef");
  assert!(body["token"].as_str().is_some());

  let req = test::TestRequest::post()
    .uri("/api/auth")
    .set_json(json!({ "action": "admin-login", "password": CHEF_PASSWORD }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/auth")
    .set_json(json!({ "action": "verify" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
#[serial]
async fn webhook_creates_once_and_acknowledges_replays_as_deduplicated() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let payload = completed_event("cs_live_1", "guest_ana");

  for attempt in 0..2 {
    let req = test::TestRequest::post()
      .uri("/api/webhooks/stripe")
      .insert_header(("Stripe-Signature", ctx.sign(&payload)))
      .set_payload(payload.clone())
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["received"], true);
    if attempt == 0 {
      assert!(body["orderId"].as_str().is_some());
      assert!(body.get("deduped").is_none());
    } else {
      assert_eq!(body["deduped"], true);
    }
  }

  assert_eq!(ctx.store.len(), 1);
  assert_eq!(ctx.mailer.sent.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
#[serial]
async fn webhook_with_a_bad_signature_is_rejected_without_writing() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let payload = completed_event("cs_live_2", "guest_ana");
  let forged = ctx.sign(b"some other body");

  let req = test::TestRequest::post()
    .uri("/api/webhooks/stripe")
    .insert_header(("Stripe-Signature", forged))
    .set_payload(payload.clone())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::post()
    .uri("/api/webhooks/stripe")
    .set_payload(payload)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
  assert!(ctx.store.is_empty());
}

#[actix_web::test]
#[serial]
async fn order_listing_requires_a_session_and_is_scoped_for_guests() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  for (session, guest) in [("cs_a", "guest_ana"), ("cs_b", "guest_bo")] {
    let payload = completed_event(session, guest);
    let outcome = ctx.state.intake.handle(payload.clone(), Some(ctx.sign(&payload))).await.unwrap();
    assert!(!outcome.is_deduplicated());
  }

  let req = test::TestRequest::get().uri("/api/orders?guestId=guest_ana").to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let ana = ctx.guest_token("guest_ana");
  let req = test::TestRequest::get()
    .uri("/api/orders?guestId=guest_ana")
    .insert_header(bearer(&ana))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["orders"].as_array().unwrap().len(), 1);

  // Someone else's guest id yields nothing.
  let req = test::TestRequest::get()
    .uri("/api/orders?guestId=guest_bo")
    .insert_header(bearer(&ana))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert!(body["orders"].as_array().unwrap().is_empty());

  let req = test::TestRequest::get()
    .uri("/api/orders?admin=true")
    .insert_header(bearer(&ana))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::get()
    .uri("/api/orders?admin=true")
    .insert_header(bearer(&ctx.chef_token()))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["orders"].as_array().unwrap().len(), 2);

  let req = test::TestRequest::get()
    .uri("/api/orders")
    .insert_header(bearer(&ana))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn staff_walk_an_order_to_completion() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let payload = completed_event("cs_walk", "guest_ana");
  ctx.state.intake.handle(payload.clone(), Some(ctx.sign(&payload))).await.unwrap();
  let order = ctx
    .state
    .lifecycle
    .store()
    .get_by_session("cs_walk")
    .await
    .unwrap()
    .unwrap();
  let chef = ctx.chef_token();

  // Guests may not drive the kitchen.
  let req = test::TestRequest::put()
    .uri("/api/orders")
    .insert_header(bearer(&ctx.guest_token("guest_ana")))
    .set_json(json!({ "action": "accept", "orderId": order.id }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::put()
    .uri("/api/orders")
    .insert_header(bearer(&chef))
    .set_json(json!({ "action": "accept", "orderId": order.id, "prepTimeMinutes": 20 }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["order"]["status"], "received");
  assert_eq!(body["order"]["prepTimeMinutes"], 20);
  assert!(body["order"]["estimatedReadyAt"].is_string());

  let req = test::TestRequest::put()
    .uri("/api/orders")
    .insert_header(bearer(&chef))
    .set_json(json!({ "action": "accept", "orderId": order.id }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

  let req = test::TestRequest::put()
    .uri("/api/orders")
    .insert_header(bearer(&chef))
    .set_json(json!({ "action": "advance", "orderId": order.id }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["order"]["status"], "preparing");

  // Skipping `ready` is refused.
  let req = test::TestRequest::put()
    .uri("/api/orders")
    .insert_header(bearer(&chef))
    .set_json(json!({ "action": "set_status", "orderId": order.id, "status": "completed" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

  for expected in ["ready", "completed"] {
    let req = test::TestRequest::put()
      .uri("/api/orders")
      .insert_header(bearer(&chef))
      .set_json(json!({ "action": "set_status", "orderId": order.id, "status": expected }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["order"]["status"], expected);
  }

  let done = ctx.state.lifecycle.store().get(order.id).await.unwrap().unwrap();
  assert_eq!(done.status, OrderStatus::Completed);
  assert_eq!(done.status_history.len(), 5);
}

#[actix_web::test]
#[serial]
async fn dev_order_then_customer_cancel_within_the_window() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let dev_body = json!({
    "items": [{ "name": "Burrito", "quantity": 1, "price": 11.5 }],
    "customerEmail": "Ana@Example.com",
    "guestId": "guest_ana"
  });

  let req = test::TestRequest::post().uri("/api/orders").set_json(dev_body.clone()).to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header(("x-dev-order", "true"))
    .set_json(dev_body)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created: Value = test::read_body_json(resp).await;
  let session_id = created["stripeSessionId"].as_str().unwrap().to_string();
  assert!(session_id.starts_with("test_"));

  let cancel = json!({ "action": "cancel", "sessionId": session_id, "customerEmail": "someone@else.com" });
  let req = test::TestRequest::post().uri("/api/orders").set_json(cancel).to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  ctx.clock.advance(Duration::seconds(90));
  let cancel = json!({ "action": "cancel", "sessionId": session_id, "customerEmail": "ana@example.com" });
  let req = test::TestRequest::post().uri("/api/orders").set_json(cancel.clone()).to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["success"], true);
  assert_eq!(body["refundId"], "test_refund");
  assert_eq!(body["order"]["status"], "cancelled");
  assert_eq!(ctx.gateway.refunds.load(Ordering::SeqCst), 0);

  // A second cancel finds the order already closed.
  let req = test::TestRequest::post().uri("/api/orders").set_json(cancel).to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn customer_cancel_after_the_window_is_refused_and_nothing_is_refunded() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let payload = completed_event("cs_late", "guest_ana");
  ctx.state.intake.handle(payload.clone(), Some(ctx.sign(&payload))).await.unwrap();

  ctx.clock.advance(Duration::seconds(121));
  let req = test::TestRequest::post()
    .uri("/api/orders")
    .set_json(json!({ "action": "cancel", "sessionId": "cs_late", "customerEmail": "ana@example.com" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("2 minutes"));
  assert_eq!(ctx.gateway.refunds.load(Ordering::SeqCst), 0);

  let order = ctx.state.lifecycle.store().get_by_session("cs_late").await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
}

#[actix_web::test]
#[serial]
async fn paid_orders_cancelled_in_time_are_refunded_through_the_gateway() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let payload = completed_event("cs_refund", "guest_ana");
  ctx.state.intake.handle(payload.clone(), Some(ctx.sign(&payload))).await.unwrap();

  ctx.clock.advance(Duration::seconds(30));
  let req = test::TestRequest::post()
    .uri("/api/orders")
    .set_json(json!({ "action": "cancel", "sessionId": "cs_refund", "customerEmail": "ANA@example.com" }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["refundId"], "re_0");
  assert_eq!(ctx.gateway.refunds.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
#[serial]
async fn dev_orders_are_refused_in_production() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Production);
  let app = app!(ctx);
  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header(("x-dev-order", "true"))
    .set_json(json!({ "items": [{ "name": "Taco", "price": 4 }], "guestId": "guest_ana" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
  assert!(ctx.store.is_empty());
}

#[actix_web::test]
#[serial]
async fn checkout_fills_the_guest_id_from_the_session() {
  setup_tracing();
  let ctx = TestApp::new(AppEnv::Development);
  let app = app!(ctx);
  let req = test::TestRequest::post()
    .uri("/api/checkout")
    .insert_header(bearer(&ctx.guest_token("guest_ana")))
    .set_json(json!({
      "items": [{ "name": "Taco", "quantity": 3, "price": 4.25, "meatType": "Pastor" }],
      "customerEmail": "ana@example.com",
      "customerName": "Ana"
    }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["sessionId"], "cs_test_0");
  assert_eq!(body["url"], "https://pay.example/cs_test_0");

  let req = test::TestRequest::post()
    .uri("/api/checkout")
    .set_json(json!({ "items": [] }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
