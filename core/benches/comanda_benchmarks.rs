use async_trait::async_trait;
use comanda::intake::chunking::{decode_items, encode_items};
use comanda::intake::IntakeSettings;
use comanda::payment::{sign_payload, CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt, RefundRequest};
use comanda::store::InMemoryOrderStore;
use comanda::{
  ContextData, LineItem, OrderError, OrderLifecycle, OrderResult, PaymentIntake, Pipeline, PipelineControl, SystemClock,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

const SECRET: &str = "whsec_bench";

struct NoopGateway;

#[async_trait]
impl PaymentGateway for NoopGateway {
  async fn create_checkout_session(&self, _request: &CheckoutRequest) -> OrderResult<CheckoutSession> {
    Ok(CheckoutSession {
      id: "cs_bench".into(),
      url: None,
    })
  }

  async fn refund(&self, _request: &RefundRequest) -> OrderResult<RefundReceipt> {
    Ok(RefundReceipt { id: "re_bench".into() })
  }
}

#[derive(Default)]
struct BenchContext {
  counter: u64,
}

fn items(n: usize) -> Vec<LineItem> {
  (0..n)
    .map(|i| {
      let mut item = LineItem::new(format!("Taco {}", i), 1 + (i as u32 % 3), Decimal::new(450, 2));
      item.sauce = Some("Verde".into());
      item
    })
    .collect()
}

fn bench_chunk_codec(c: &mut Criterion) {
  let mut group = c.benchmark_group("ChunkCodec");
  for n in [1usize, 10, 50] {
    let list = items(n);
    let metadata: HashMap<String, String> = encode_items(&list).unwrap().into_iter().collect();
    group.throughput(Throughput::Elements(n as u64));
    group.bench_with_input(BenchmarkId::new("encode", n), &list, |b, list| {
      b.iter(|| encode_items(list).unwrap())
    });
    group.bench_with_input(BenchmarkId::new("decode", n), &metadata, |b, md| {
      b.iter(|| decode_items(md).unwrap())
    });
  }
  group.finish();
}

fn bench_step_overhead(c: &mut Criterion) {
  let mut group = c.benchmark_group("StepPipeline");
  let rt = Runtime::new().unwrap();

  for num_steps in [1usize, 6, 12] {
    let names: Vec<String> = (0..num_steps).map(|i| format!("step_{}", i)).collect();
    let defs: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), false)).collect();
    let mut pipeline = Pipeline::<BenchContext>::from_names(&defs);
    for name in &names {
      pipeline.on_root(name, |ctx: ContextData<BenchContext>| async move {
        ctx.write().counter += 1;
        Ok::<_, OrderError>(PipelineControl::Continue)
      });
    }
    let pipeline = Arc::new(pipeline);

    group.throughput(Throughput::Elements(num_steps as u64));
    group.bench_function(BenchmarkId::new("run", num_steps), |b| {
      b.to_async(&rt).iter_batched(
        || ContextData::new(BenchContext::default()),
        |ctx| {
          let p = pipeline.clone();
          async move { p.run(ctx).await.unwrap() }
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_webhook_intake(c: &mut Criterion) {
  let mut group = c.benchmark_group("WebhookIntake");
  let rt = Runtime::new().unwrap();
  let lifecycle = OrderLifecycle::new(
    Arc::new(InMemoryOrderStore::new()),
    Arc::new(NoopGateway),
    Arc::new(SystemClock),
  );
  let intake = Arc::new(PaymentIntake::new(lifecycle, None, Arc::new(SystemClock), IntakeSettings::new(SECRET)));
  let seq = Arc::new(AtomicU64::new(0));
  let order_items = serde_json::to_string(&items(3)).unwrap();

  for dedup in [false, true] {
    let label = if dedup { "duplicate" } else { "fresh" };
    group.bench_function(label, |b| {
      b.to_async(&rt).iter_batched(
        || {
          let n = if dedup { 0 } else { seq.fetch_add(1, Ordering::Relaxed) + 1 };
          let body = serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": {
              "id": format!("cs_bench_{}", n),
              "customer_email": "bench@example.com",
              "amount_total": 1350,
              "metadata": { "orderItems": order_items }
            }}
          }))
          .unwrap();
          let header = sign_payload(&body, SECRET, chrono::Utc::now().timestamp()).unwrap();
          (body, header)
        },
        |(body, header)| {
          let intake = intake.clone();
          async move { intake.handle(body, Some(header)).await.unwrap() }
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

criterion_group!(benches, bench_chunk_codec, bench_step_overhead, bench_webhook_intake);
criterion_main!(benches);
