// comanda/src/identity/jwt.rs

//! HS256 session tokens for the four roles.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Principal, Role, TokenVerifier};
use crate::error::{OrderError, OrderResult};

/// Token lifetimes per role. Customer-side sessions last days, staff sessions hours.
#[derive(Debug, Clone)]
pub struct JwtConfig {
  pub secret: String,
  pub guest_ttl: Duration,
  pub customer_ttl: Duration,
  pub admin_ttl: Duration,
  pub staff_ttl: Duration,
}

impl JwtConfig {
  pub fn with_secret(secret: impl Into<String>) -> Self {
    Self {
      secret: secret.into(),
      guest_ttl: Duration::days(7),
      customer_ttl: Duration::days(30),
      admin_ttl: Duration::hours(8),
      staff_ttl: Duration::hours(12),
    }
  }

  fn ttl_for(&self, role: Role) -> Duration {
    match role {
      Role::Guest => self.guest_ttl,
      Role::Customer => self.customer_ttl,
      Role::Admin => self.admin_ttl,
      Role::Staff => self.staff_ttl,
    }
  }
}

/// Claims carried by a session token. `type` uses the wire names `guest|user|admin|chef`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
  pub sub: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  pub iat: i64,
  pub exp: i64,
}

fn wire_kind(role: Role) -> &'static str {
  match role {
    Role::Guest => "guest",
    Role::Customer => "user",
    Role::Admin => "admin",
    Role::Staff => "chef",
  }
}

fn role_from_wire(kind: &str) -> Option<Role> {
  match kind {
    "guest" => Some(Role::Guest),
    "user" => Some(Role::Customer),
    "admin" => Some(Role::Admin),
    "chef" => Some(Role::Staff),
    _ => None,
  }
}

#[derive(Clone)]
pub struct JwtIdentity {
  config: JwtConfig,
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtIdentity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JwtIdentity").finish_non_exhaustive()
  }
}

impl JwtIdentity {
  pub fn new(config: JwtConfig) -> Self {
    let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
    let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
    Self {
      config,
      encoding_key,
      decoding_key,
    }
  }

  /// Signs a token for `principal`, valid for the role's configured lifetime.
  pub fn issue(&self, principal: &Principal) -> OrderResult<String> {
    self.issue_with_ttl(principal, self.config.ttl_for(principal.role))
  }

  pub fn issue_with_ttl(&self, principal: &Principal, ttl: Duration) -> OrderResult<String> {
    let now = Utc::now();
    let claims = SessionClaims {
      sub: principal.subject_id.clone(),
      kind: wire_kind(principal.role).to_string(),
      email: principal.email.clone(),
      iat: now.timestamp(),
      exp: (now + ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
      .map_err(|e| OrderError::Validation(format!("failed to sign session token: {}", e)))
  }

  /// Starts an anonymous guest session with a fresh `guest_<uuid>` id.
  pub fn issue_guest(&self) -> OrderResult<(String, Principal)> {
    let principal = Principal::guest(format!("guest_{}", Uuid::new_v4()));
    let token = self.issue(&principal)?;
    debug!(guest_id = %principal.subject_id, "Issued guest session token.");
    Ok((token, principal))
  }
}

impl TokenVerifier for JwtIdentity {
  fn verify(&self, bearer_token: &str) -> OrderResult<Principal> {
    let token = bearer_token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    if token.is_empty() {
      return Err(OrderError::unauthorized("missing bearer token"));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
      let reason = match e.kind() {
        ErrorKind::ExpiredSignature => "session token expired",
        ErrorKind::InvalidSignature => "session token signature invalid",
        _ => "session token malformed",
      };
      warn!(error = %e, "Rejected bearer token.");
      OrderError::unauthorized(reason)
    })?;

    let claims = data.claims;
    let role = role_from_wire(&claims.kind)
      .ok_or_else(|| OrderError::unauthorized(format!("unknown session type '{}'", claims.kind)))?;
    if role == Role::Customer && claims.email.is_none() {
      return Err(OrderError::unauthorized("customer session without email"));
    }
    Ok(Principal {
      role,
      subject_id: claims.sub,
      email: claims.email,
    })
  }
}
