// comanda_server/src/services/email.rs

//! Order confirmation email: Resend in production, a logging mailer otherwise.

use async_trait::async_trait;
use comanda::error::{OrderError, OrderResult};
use comanda::mailer::{Mailer, OrderConfirmation};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

fn escape_html(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

pub fn confirmation_subject(confirmation: &OrderConfirmation) -> String {
  format!("Order Confirmed! #{}", confirmation.short_reference())
}

pub fn render_confirmation_html(confirmation: &OrderConfirmation) -> String {
  let rows: String = confirmation
    .items
    .iter()
    .map(|item| {
      let mut extras = Vec::new();
      if let Some(meat) = &item.meat_type {
        extras.push(escape_html(meat));
      }
      if let Some(sauce) = &item.sauce {
        extras.push(escape_html(sauce));
      }
      if let Some(toppings) = item.toppings.as_ref().filter(|t| !t.is_empty()) {
        extras.push(escape_html(&toppings.join(", ")));
      }
      let detail = if extras.is_empty() {
        String::new()
      } else {
        format!("<br><small>{}</small>", extras.join(" &middot; "))
      };
      format!(
        "<tr><td>{}{}</td><td style=\"text-align:center\">{}</td><td style=\"text-align:right\">{}</td></tr>",
        escape_html(&item.name),
        detail,
        item.qty,
        item.line_total().map(|t| format!("${:.2}", t)).unwrap_or_default()
      )
    })
    .collect();

  format!(
    "<!DOCTYPE html><html><body style=\"font-family: sans-serif\">\
     <h1>Order Confirmed!</h1>\
     <p>Hola <strong>{name}</strong>! Thank you for your order.</p>\
     <p><strong>Order #{reference}</strong></p>\
     <table style=\"width:100%\"><thead><tr><th>Item</th><th>Qty</th><th>Price</th></tr></thead>\
     <tbody>{rows}</tbody>\
     <tfoot><tr><td colspan=\"2\" style=\"text-align:right\"><strong>Total:</strong></td>\
     <td style=\"text-align:right\"><strong>${total:.2}</strong></td></tr></tfoot></table>\
     <p>Estimated pickup time: 15-20 minutes</p>\
     </body></html>",
    name = escape_html(&confirmation.customer_name),
    reference = confirmation.short_reference(),
    rows = rows,
    total = confirmation.total,
  )
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
  id: String,
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
  client: reqwest::Client,
  api_key: String,
  sender: String,
  endpoint: String,
}

impl ResendMailer {
  pub fn new(api_key: impl Into<String>, sender: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      api_key: api_key.into(),
      sender: sender.into(),
      endpoint: RESEND_API_URL.to_string(),
    }
  }
}

#[async_trait]
impl Mailer for ResendMailer {
  #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> OrderResult<String> {
    let payload = json!({
      "from": self.sender,
      "to": [confirmation.recipient],
      "subject": confirmation_subject(confirmation),
      "html": render_confirmation_html(confirmation),
    });
    let response = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&payload)
      .send()
      .await
      .map_err(|e| OrderError::upstream("email", e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%status, %body, "Resend rejected the confirmation email.");
      return Err(OrderError::upstream(
        "email",
        anyhow::anyhow!("Resend returned {}: {}", status, body),
      ));
    }
    let sent: ResendResponse = response.json().await.map_err(|e| OrderError::upstream("email", e))?;
    info!(message_id = %sent.id, "Order confirmation sent.");
    Ok(sent.id)
  }
}

/// Development mailer: logs the confirmation instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
  async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> OrderResult<String> {
    let message_id = format!("logged_{}", Uuid::new_v4().simple());
    info!(
      to = %confirmation.recipient,
      subject = %confirmation_subject(confirmation),
      total = %confirmation.total,
      %message_id,
      "Order confirmation (not sent, no email provider configured)."
    );
    Ok(message_id)
  }
}
