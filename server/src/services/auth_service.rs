// comanda_server/src/services/auth_service.rs

//! Staff password checks against configured Argon2 hashes, and session issuance.

use crate::config::AppConfig;
use crate::errors::AppError;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use comanda::identity::JwtIdentity;
use comanda::{Principal, Role};
use tracing::{debug, error, info, instrument, warn};

/// Hashes a plain-text password into a PHC string, for producing
/// `ADMIN_PASSWORD_HASH` / `CHEF_PASSWORD_HASH` values.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty for hashing.".to_string()));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      AppError::Internal(format!("Password hashing process failed: {}", e))
    })
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash itself is unusable.
#[instrument(name = "auth_service::verify_password", skip(hashed_password_str, provided_password), err(Display))]
pub fn verify_password(hashed_password_str: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }
  let parsed_hash = PasswordHash::new(hashed_password_str).map_err(|e| {
    error!(error = %e, "Failed to parse stored password hash string.");
    AppError::Config(format!("Invalid stored password hash format: {}", e))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password verification failed: Passwords do not match.");
      Ok(false)
    }
    Err(other) => {
      error!(error = %other, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!("Password verification process failed: {}", other)))
    }
  }
}

/// Checks a staff password for `role` (admin or kitchen) and issues its session token.
#[instrument(name = "auth_service::staff_login", skip(config, identity, password), fields(role = %role))]
pub fn staff_login(config: &AppConfig, identity: &JwtIdentity, role: Role, password: &str) -> Result<String, AppError> {
  let (stored_hash, principal) = match role {
    Role::Admin => (config.admin_password_hash.as_deref(), Principal::admin()),
    Role::Staff => (config.chef_password_hash.as_deref(), Principal::kitchen()),
    Role::Guest | Role::Customer => {
      return Err(AppError::Validation(format!("'{}' is not a staff role", role)));
    }
  };
  let stored_hash = stored_hash.ok_or_else(|| {
    warn!("Staff login attempted but no password hash is configured for this role.");
    AppError::Auth("Invalid password".to_string())
  })?;

  if !verify_password(stored_hash, password)? {
    warn!("Staff login rejected.");
    return Err(AppError::Auth("Invalid password".to_string()));
  }
  let token = identity.issue(&principal)?;
  info!("Staff session issued.");
  Ok(token)
}
