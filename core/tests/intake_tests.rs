// tests/intake_tests.rs
mod common;

use common::*;
use comanda::intake::chunking::{encode_items, CHUNK_COUNT_KEY};
use comanda::intake::{IntakeOutcome, INTAKE_STEPS, PAYMENT_RECEIVED_NOTE};
use comanda::store::OrderQuery;
use comanda::{LineItem, OrderError, OrderStatus, OrderStore};
use rust_decimal::Decimal;
use serde_json::json;
use serial_test::serial;
use std::sync::atomic::Ordering;

#[tokio::test]
#[serial]
async fn test_happy_path_creates_pending_order() {
  setup_tracing();
  let h = Harness::new();
  let outcome = h.deliver(&taco_event("cs_test_1")).await.unwrap();

  let IntakeOutcome::Created { order_id } = outcome else {
    panic!("expected a created order, got {:?}", outcome);
  };
  let order = h.store.get(order_id).await.unwrap().unwrap();
  assert_eq!(order.stripe_session_id.as_deref(), Some("cs_test_1"));
  assert_eq!(order.payment_intent_id.as_deref(), Some("pi_cs_test_1"));
  assert_eq!(order.total_amount, Decimal::new(800, 2));
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.guest_id.as_deref(), Some("guest_abc"));
  assert_eq!(order.customer_phone.as_deref(), Some("555-0101"));
  assert_eq!(order.items, vec![LineItem::new("Taco", 2, Decimal::new(4, 0))]);
  assert_eq!(order.status_history[0].note.as_deref(), Some(PAYMENT_RECEIVED_NOTE));
  assert_eq!(h.mailer.sent_count(), 1);
  assert_eq!(h.mailer.sent.lock()[0].recipient, "Ana@Example.com");
}

#[tokio::test]
#[serial]
async fn test_repeated_delivery_creates_exactly_one_order() {
  setup_tracing();
  let h = Harness::new();
  let body = taco_event("cs_retry");

  let mut outcomes = Vec::new();
  for _ in 0..5 {
    outcomes.push(h.deliver(&body).await.unwrap());
  }
  assert!(matches!(outcomes[0], IntakeOutcome::Created { .. }));
  assert!(outcomes[1..].iter().all(IntakeOutcome::is_deduplicated));
  assert_eq!(h.store.len(), 1);
  assert_eq!(h.mailer.sent_count(), 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_duplicate_deliveries() {
  setup_tracing();
  let h = Harness::new();
  let body = taco_event("cs_race");
  let (a, b, c) = tokio::join!(h.deliver(&body), h.deliver(&body), h.deliver(&body));
  let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

  let created = outcomes.iter().filter(|o| matches!(o, IntakeOutcome::Created { .. })).count();
  assert_eq!(created, 1);
  let found = h.store.find(&OrderQuery::BySession("cs_race".into())).await.unwrap();
  assert_eq!(found.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_bad_signatures_are_rejected_before_persistence() {
  setup_tracing();
  let h = Harness::new();
  let body = taco_event("cs_forged");

  let forged = comanda::payment::sign_payload(&body, "whsec_wrong", h.clock_now().timestamp()).unwrap();
  assert!(matches!(
    h.intake.handle(body.clone(), Some(forged)).await,
    Err(OrderError::InvalidSignature(_))
  ));
  assert!(matches!(h.intake.handle(body.clone(), None).await, Err(OrderError::InvalidSignature(_))));

  let mut tampered = body.clone();
  let header = h.sign(&body);
  tampered.extend_from_slice(b" ");
  assert!(matches!(
    h.intake.handle(tampered, Some(header)).await,
    Err(OrderError::InvalidSignature(_))
  ));
  assert!(h.store.is_empty());
}

#[tokio::test]
#[serial]
async fn test_other_event_types_are_acknowledged_and_ignored() {
  setup_tracing();
  let h = Harness::new();
  let body = serde_json::to_vec(&json!({
    "id": "evt_pi",
    "type": "payment_intent.succeeded",
    "data": { "object": { "id": "pi_1" } }
  }))
  .unwrap();
  let outcome = h.deliver(&body).await.unwrap();
  assert_eq!(
    outcome,
    IntakeOutcome::Ignored {
      event_type: "payment_intent.succeeded".into()
    }
  );
  assert!(h.store.is_empty());
}

#[tokio::test]
#[serial]
async fn test_chunked_item_metadata_is_reassembled() {
  setup_tracing();
  let h = Harness::new();
  let items: Vec<LineItem> = (0..15)
    .map(|i| {
      let mut item = LineItem::new(format!("Burrito grande número {}", i), 1, Decimal::new(1250, 2));
      item.meat_type = Some("Carnitas".into());
      item.toppings = Some(vec!["cilantro".into(), "cebolla".into()]);
      item
    })
    .collect();
  let mut metadata = serde_json::Map::new();
  for (k, v) in encode_items(&items).unwrap() {
    metadata.insert(k, json!(v));
  }
  assert!(metadata.contains_key(CHUNK_COUNT_KEY));
  metadata.insert("customerName".into(), json!("Ana"));

  let outcome = h
    .deliver(&completed_event("cs_big", serde_json::Value::Object(metadata), 18750))
    .await
    .unwrap();
  let IntakeOutcome::Created { order_id } = outcome else {
    panic!("expected a created order");
  };
  let order = h.store.get(order_id).await.unwrap().unwrap();
  assert_eq!(order.items, items);
  assert_eq!(order.total_amount.to_string(), "187.50");
}

#[tokio::test]
#[serial]
async fn test_missing_chunk_fails_only_that_notification() {
  setup_tracing();
  let h = Harness::new();
  let broken = completed_event(
    "cs_broken",
    json!({ "orderItemsChunks": "2", "orderItems_0": "[{\"name\":\"Taco\"," }),
    400,
  );
  assert!(matches!(h.deliver(&broken).await, Err(OrderError::MalformedPayload(_))));
  assert!(h.store.is_empty());

  h.deliver(&taco_event("cs_fine")).await.unwrap();
  assert_eq!(h.store.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_email_failure_does_not_roll_back() {
  setup_tracing();
  let h = Harness::new();
  h.mailer.fail.store(true, Ordering::SeqCst);

  let outcome = h.deliver(&taco_event("cs_mailfail")).await.unwrap();
  assert!(matches!(outcome, IntakeOutcome::Created { .. }));
  assert_eq!(h.store.len(), 1);
  assert_eq!(h.mailer.sent_count(), 0);
}

#[tokio::test]
#[serial]
async fn test_pipeline_shape() {
  let h = Harness::new();
  assert_eq!(h.intake.step_names(), INTAKE_STEPS.to_vec());
}
