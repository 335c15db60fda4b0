// comanda_server/src/services/stripe.rs

//! Stripe over plain REST: form-encoded requests with the secret key as basic auth.

use async_trait::async_trait;
use comanda::error::{OrderError, OrderResult};
use comanda::payment::{CheckoutRequest, CheckoutSession, PaymentGateway, RefundReceipt, RefundRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, instrument, warn};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const SERVICE: &str = "payments";

#[derive(Debug, Deserialize)]
struct StripeSessionBody {
  id: String,
  url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefundBody {
  id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
  error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
  message: Option<String>,
  #[serde(rename = "type")]
  kind: Option<String>,
}

/// Flattens a checkout request into Stripe's bracketed form keys.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
  let mut form = vec![
    ("payment_method_types[0]".to_string(), "card".to_string()),
    ("mode".to_string(), "payment".to_string()),
    ("success_url".to_string(), request.success_url.clone()),
    ("cancel_url".to_string(), request.cancel_url.clone()),
  ];
  if let Some(email) = &request.customer_email {
    form.push(("customer_email".to_string(), email.clone()));
  }
  for (i, line) in request.line_items.iter().enumerate() {
    let prefix = format!("line_items[{}]", i);
    form.push((format!("{}[price_data][currency]", prefix), "usd".to_string()));
    form.push((format!("{}[price_data][product_data][name]", prefix), line.name.clone()));
    if let Some(description) = &line.description {
      form.push((
        format!("{}[price_data][product_data][description]", prefix),
        description.clone(),
      ));
    }
    if let Some(image) = &line.image_url {
      form.push((format!("{}[price_data][product_data][images][0]", prefix), image.clone()));
    }
    form.push((
      format!("{}[price_data][unit_amount]", prefix),
      line.unit_amount_cents.to_string(),
    ));
    form.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
  }
  for (key, value) in &request.metadata {
    form.push((format!("metadata[{}]", key), value.clone()));
  }
  form
}

#[derive(Debug, Clone)]
pub struct StripeGateway {
  client: reqwest::Client,
  secret_key: String,
  api_base: String,
}

impl StripeGateway {
  pub fn new(secret_key: impl Into<String>) -> Self {
    Self::with_base(secret_key, STRIPE_API_BASE)
  }

  /// Points the client at another API origin (a mock server, for instance).
  pub fn with_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      secret_key: secret_key.into(),
      api_base: api_base.into(),
    }
  }

  async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> OrderResult<T> {
    let response = self
      .client
      .post(format!("{}{}", self.api_base, path))
      .basic_auth(&self.secret_key, None::<&str>)
      .form(form)
      .send()
      .await
      .map_err(|e| OrderError::upstream(SERVICE, e))?;

    let status = response.status();
    if !status.is_success() {
      let detail = match response.json::<StripeErrorBody>().await {
        Ok(body) => format!(
          "{} ({})",
          body.error.message.unwrap_or_default(),
          body.error.kind.unwrap_or_else(|| "unknown".to_string())
        ),
        Err(_) => "unreadable error body".to_string(),
      };
      warn!(%status, %detail, path, "Stripe request failed.");
      return Err(OrderError::upstream(
        SERVICE,
        anyhow::anyhow!("Stripe {} returned {}: {}", path, status, detail),
      ));
    }
    response.json::<T>().await.map_err(|e| OrderError::upstream(SERVICE, e))
  }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
  #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
  async fn create_checkout_session(&self, request: &CheckoutRequest) -> OrderResult<CheckoutSession> {
    let body: StripeSessionBody = self.post_form("/checkout/sessions", &checkout_form(request)).await?;
    info!(session_id = %body.id, "Checkout session created.");
    Ok(CheckoutSession {
      id: body.id,
      url: body.url,
    })
  }

  #[instrument(skip(self, request), fields(payment_intent = %request.payment_intent_id))]
  async fn refund(&self, request: &RefundRequest) -> OrderResult<RefundReceipt> {
    let mut form = vec![("payment_intent".to_string(), request.payment_intent_id.clone())];
    if let Some(cents) = request.amount_cents {
      form.push(("amount".to_string(), cents.to_string()));
    }
    let body: StripeRefundBody = self.post_form("/refunds", &form).await?;
    info!(refund_id = %body.id, "Refund issued.");
    Ok(RefundReceipt { id: body.id })
  }
}
