// comanda/src/intake/pipeline.rs

//! The webhook handling pipeline.
//!
//! `verify_signature → parse_event → reassemble_items → create_order →
//! send_confirmation (optional) → acknowledge`

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::event::{CompletedSession, WebhookEvent, CHECKOUT_COMPLETED};
use super::IntakeOutcome;
use crate::clock::Clock;
use crate::error::{OrderError, OrderResult};
use crate::lifecycle::OrderLifecycle;
use crate::mailer::{Mailer, OrderConfirmation};
use crate::model::{NewOrder, Order};
use crate::payment::{verify_signature, DEFAULT_TOLERANCE_SECS};
use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineResult, StepDef};

pub const PAYMENT_RECEIVED_NOTE: &str = "Payment received, awaiting approval";

pub const INTAKE_STEPS: [&str; 6] = [
  "verify_signature",
  "parse_event",
  "reassemble_items",
  "create_order",
  "send_confirmation",
  "acknowledge",
];

#[derive(Debug, Clone)]
pub struct IntakeSettings {
  pub webhook_secret: String,
  pub tolerance_secs: i64,
}

impl IntakeSettings {
  pub fn new(webhook_secret: impl Into<String>) -> Self {
    Self {
      webhook_secret: webhook_secret.into(),
      tolerance_secs: DEFAULT_TOLERANCE_SECS,
    }
  }
}

/// Per-delivery state threaded through the steps.
#[derive(Debug, Default)]
pub struct IntakeContext {
  pub raw_body: Vec<u8>,
  pub signature_header: Option<String>,
  pub event: Option<WebhookEvent>,
  pub session: Option<CompletedSession>,
  pub new_order: Option<NewOrder>,
  pub order: Option<Order>,
  pub outcome: Option<IntakeOutcome>,
}

impl IntakeContext {
  pub fn new(raw_body: Vec<u8>, signature_header: Option<String>) -> Self {
    Self {
      raw_body,
      signature_header,
      ..Default::default()
    }
  }
}

fn missing(what: &str) -> OrderError {
  OrderError::MalformedPayload(format!("{} not available at this step", what))
}

pub struct PaymentIntake {
  pipeline: Pipeline<IntakeContext>,
}

impl std::fmt::Debug for PaymentIntake {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PaymentIntake")
      .field("steps", &self.pipeline.step_names())
      .finish()
  }
}

impl PaymentIntake {
  /// Wires the intake pipeline. Without a mailer the confirmation step is skipped.
  pub fn new(
    lifecycle: OrderLifecycle,
    mailer: Option<Arc<dyn Mailer>>,
    clock: Arc<dyn Clock>,
    settings: IntakeSettings,
  ) -> Self {
    let mut pipeline: Pipeline<IntakeContext> = Pipeline::new(
      INTAKE_STEPS
        .iter()
        .map(|name| {
          if *name == "send_confirmation" {
            StepDef::optional(*name)
          } else {
            StepDef::required(*name)
          }
        })
        .collect(),
    );

    let settings = Arc::new(settings);
    pipeline.on_root("verify_signature", move |ctx: ContextData<IntakeContext>| {
      let settings = settings.clone();
      let clock = clock.clone();
      async move {
        let c = ctx.read();
        let header = c
          .signature_header
          .as_deref()
          .ok_or_else(|| OrderError::InvalidSignature("missing signature header".to_string()))?;
        verify_signature(
          &c.raw_body,
          header,
          &settings.webhook_secret,
          clock.now(),
          settings.tolerance_secs,
        )?;
        Ok::<_, OrderError>(PipelineControl::Continue)
      }
    });

    pipeline.on_root("parse_event", |ctx: ContextData<IntakeContext>| async move {
      let mut c = ctx.write();
      let event: WebhookEvent = serde_json::from_slice(&c.raw_body)
        .map_err(|e| OrderError::MalformedPayload(format!("webhook event: {}", e)))?;
      if event.event_type != CHECKOUT_COMPLETED {
        info!(event_type = %event.event_type, "Ignoring webhook event.");
        c.outcome = Some(IntakeOutcome::Ignored {
          event_type: event.event_type,
        });
        return Ok::<_, OrderError>(PipelineControl::Stop);
      }
      c.session = Some(CompletedSession::from_event(&event)?);
      c.event = Some(event);
      Ok(PipelineControl::Continue)
    });

    pipeline.on_root("reassemble_items", |ctx: ContextData<IntakeContext>| async move {
      let mut c = ctx.write();
      let session = c.session.as_ref().ok_or_else(|| missing("checkout session"))?;
      let new_order = session.to_new_order()?;
      c.new_order = Some(new_order);
      Ok::<_, OrderError>(PipelineControl::Continue)
    });

    let creator = lifecycle.clone();
    pipeline.on_root("create_order", move |ctx: ContextData<IntakeContext>| {
      let lifecycle = creator.clone();
      async move {
        let new_order = ctx.write().new_order.take().ok_or_else(|| missing("order draft"))?;
        let session_id = new_order.stripe_session_id.clone().unwrap_or_default();
        match lifecycle.create(new_order, Some(PAYMENT_RECEIVED_NOTE.to_string())).await {
          Ok(order) => {
            let mut c = ctx.write();
            c.outcome = Some(IntakeOutcome::Created { order_id: order.id });
            c.order = Some(order);
            Ok(PipelineControl::Continue)
          }
          Err(e) if e.is_duplicate() => {
            info!(%session_id, "Order already exists for session, deduplicated.");
            ctx.write().outcome = Some(IntakeOutcome::Deduplicated { session_id });
            Ok(PipelineControl::Stop)
          }
          Err(e) => Err(e),
        }
      }
    });

    if let Some(mailer) = mailer {
      pipeline.on_root("send_confirmation", move |ctx: ContextData<IntakeContext>| {
        let mailer = mailer.clone();
        async move {
          let confirmation = ctx.read().order.as_ref().and_then(OrderConfirmation::for_order);
          let Some(confirmation) = confirmation else {
            return Ok::<_, OrderError>(PipelineControl::Continue);
          };
          match mailer.send_order_confirmation(&confirmation).await {
            Ok(message_id) => info!(order_id = %confirmation.order_id, %message_id, "Confirmation email sent."),
            Err(e) => warn!(order_id = %confirmation.order_id, error = %e, "Confirmation email failed; order kept."),
          }
          Ok(PipelineControl::Continue)
        }
      });
    }

    pipeline.on_root("acknowledge", |ctx: ContextData<IntakeContext>| async move {
      let c = ctx.read();
      if let Some(order) = &c.order {
        info!(order_id = %order.id, session_id = ?order.stripe_session_id, "Webhook acknowledged.");
      }
      Ok::<_, OrderError>(PipelineControl::Continue)
    });

    Self { pipeline }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.pipeline.step_names()
  }

  /// Processes one delivery. Any `Ok` means "acknowledge with success".
  #[instrument(name = "PaymentIntake::handle", skip_all, fields(body_len = raw_body.len()))]
  pub async fn handle(&self, raw_body: Vec<u8>, signature_header: Option<String>) -> OrderResult<IntakeOutcome> {
    let ctx = ContextData::new(IntakeContext::new(raw_body, signature_header));
    let result = self.pipeline.run(ctx.clone()).await?;
    let outcome = ctx.write().outcome.take();
    match (result, outcome) {
      (PipelineResult::Completed | PipelineResult::Stopped, Some(outcome)) => Ok(outcome),
      (_, None) => Err(OrderError::PipelineMisconfigured {
        step_name: "acknowledge".to_string(),
      }),
    }
  }
}
