// comanda/src/identity/mod.rs

//! Who is calling: bearer-token verification and the four actor roles.

pub mod jwt;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OrderError, OrderResult};

pub use jwt::{JwtConfig, JwtIdentity, SessionClaims};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Guest,
  Customer,
  Admin,
  /// Kitchen staff ("chef").
  Staff,
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Role::Guest => "guest",
      Role::Customer => "customer",
      Role::Admin => "admin",
      Role::Staff => "staff",
    };
    f.write_str(label)
  }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
  pub role: Role,
  pub subject_id: String,
  pub email: Option<String>,
}

impl Principal {
  pub fn guest(guest_id: impl Into<String>) -> Self {
    Self {
      role: Role::Guest,
      subject_id: guest_id.into(),
      email: None,
    }
  }

  pub fn customer(user_id: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      role: Role::Customer,
      subject_id: user_id.into(),
      email: Some(email.into()),
    }
  }

  pub fn admin() -> Self {
    Self {
      role: Role::Admin,
      subject_id: "admin".to_string(),
      email: None,
    }
  }

  pub fn kitchen() -> Self {
    Self {
      role: Role::Staff,
      subject_id: "chef".to_string(),
      email: None,
    }
  }

  /// Admin and kitchen staff may mutate any order.
  pub fn is_staff(&self) -> bool {
    matches!(self.role, Role::Admin | Role::Staff)
  }

  pub fn require_staff(&self) -> OrderResult<()> {
    if self.is_staff() {
      Ok(())
    } else {
      Err(OrderError::unauthorized(format!(
        "role '{}' may not modify orders",
        self.role
      )))
    }
  }
}

/// `verify(token) → principal ∪ ⟂`. Expired, malformed and wrongly-signed tokens are rejected.
pub trait TokenVerifier: Send + Sync {
  fn verify(&self, bearer_token: &str) -> OrderResult<Principal>;
}
