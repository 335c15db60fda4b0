// comanda/src/payment/signature.rs

//! Payment-processor webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac-sha256>[,v1=...]`, where the MAC is
//! computed over `"<t>.<raw body>"` with the endpoint secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{OrderError, OrderResult};

type HmacSha256 = Hmac<Sha256>;

/// Default replay window for signed timestamps.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn mac_for(secret: &str, timestamp: &str, payload: &[u8]) -> OrderResult<HmacSha256> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|_| OrderError::InvalidSignature("webhook secret is not a usable HMAC key".to_string()))?;
  mac.update(timestamp.as_bytes());
  mac.update(b".");
  mac.update(payload);
  Ok(mac)
}

/// Verifies `sig_header` against the raw request body.
///
/// Any one matching `v1` entry is enough. Timestamps further than `tolerance_secs`
/// from `now` in either direction are rejected.
pub fn verify_signature(
  payload: &[u8],
  sig_header: &str,
  secret: &str,
  now: DateTime<Utc>,
  tolerance_secs: i64,
) -> OrderResult<()> {
  let mut timestamp = None;
  let mut signatures = Vec::new();
  for part in sig_header.split(',') {
    let part = part.trim();
    if let Some(t) = part.strip_prefix("t=") {
      timestamp = Some(t);
    } else if let Some(v) = part.strip_prefix("v1=") {
      signatures.push(v);
    }
  }

  let timestamp = timestamp.ok_or_else(|| OrderError::InvalidSignature("missing timestamp".to_string()))?;
  if signatures.is_empty() {
    return Err(OrderError::InvalidSignature("missing v1 signature".to_string()));
  }

  let ts: i64 = timestamp
    .parse()
    .map_err(|_| OrderError::InvalidSignature(format!("invalid timestamp '{}'", timestamp)))?;
  let skew = now.timestamp().checked_sub(ts).map(i64::unsigned_abs);
  if !skew.is_some_and(|skew| skew <= tolerance_secs.unsigned_abs()) {
    return Err(OrderError::InvalidSignature("timestamp outside tolerance".to_string()));
  }

  for candidate in signatures {
    let Ok(sig_bytes) = hex::decode(candidate) else {
      continue;
    };
    // verify_slice compares in constant time
    if mac_for(secret, timestamp, payload)?.verify_slice(&sig_bytes).is_ok() {
      return Ok(());
    }
  }
  Err(OrderError::InvalidSignature("signature mismatch".to_string()))
}

/// Produces a header value in the format `verify_signature` accepts.
/// Used by the development order path and tests.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> OrderResult<String> {
  let ts = timestamp.to_string();
  let digest = mac_for(secret, &ts, payload)?.finalize().into_bytes();
  Ok(format!("t={},v1={}", ts, hex::encode(digest)))
}
