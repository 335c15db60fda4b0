// comanda_server/src/config.rs

use crate::errors::{AppError, Result};
use comanda::payment::DEFAULT_TOLERANCE_SECS;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
  Development,
  Production,
}

impl AppEnv {
  fn parse(raw: &str) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "production" | "prod" => AppEnv::Production,
      _ => AppEnv::Development,
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  /// Public origin of the storefront, used for checkout redirect URLs.
  pub app_base_url: String,
  pub app_env: AppEnv,

  pub jwt_secret: String,
  /// Argon2 PHC strings. A missing hash disables that staff login.
  pub admin_password_hash: Option<String>,
  pub chef_password_hash: Option<String>,

  pub stripe_secret_key: String,
  pub stripe_webhook_secret: String,
  pub webhook_tolerance_secs: i64,

  /// Without a key, confirmations are only logged.
  pub resend_api_key: Option<String>,
  pub email_sender: String,
}

// Secrets stay out of the logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("app_base_url", &self.app_base_url)
      .field("app_env", &self.app_env)
      .field("admin_login", &self.admin_password_hash.is_some())
      .field("chef_login", &self.chef_password_hash.is_some())
      .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
      .field("resend", &self.resend_api_key.is_some())
      .field("email_sender", &self.email_sender)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let optional = |var_name: &str| get_env(var_name).ok().filter(|v| !v.trim().is_empty());

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let app_base_url = get_env("APP_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));
    let app_env = AppEnv::parse(&get_env("APP_ENV").unwrap_or_default());

    let jwt_secret = get_env("JWT_SECRET")?;
    let admin_password_hash = optional("ADMIN_PASSWORD_HASH");
    let chef_password_hash = optional("CHEF_PASSWORD_HASH");

    let stripe_secret_key = get_env("STRIPE_SECRET_KEY")?;
    let stripe_webhook_secret = get_env("STRIPE_WEBHOOK_SECRET")?;
    let webhook_tolerance_secs = match optional("WEBHOOK_TOLERANCE_SECS") {
      Some(raw) => raw
        .parse::<i64>()
        .map_err(|e| AppError::Config(format!("Invalid WEBHOOK_TOLERANCE_SECS: {}", e)))?,
      None => DEFAULT_TOLERANCE_SECS,
    };

    let resend_api_key = optional("RESEND_API_KEY");
    let email_sender = get_env("EMAIL_SENDER").unwrap_or_else(|_| "Comanda <onboarding@resend.dev>".to_string());

    if app_env == AppEnv::Production && resend_api_key.is_none() {
      tracing::warn!("RESEND_API_KEY not set; order confirmations will only be logged.");
    }
    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      app_base_url,
      app_env,
      jwt_secret,
      admin_password_hash,
      chef_password_hash,
      stripe_secret_key,
      stripe_webhook_secret,
      webhook_tolerance_secs,
      resend_api_key,
      email_sender,
    })
  }

  pub fn is_production(&self) -> bool {
    self.app_env == AppEnv::Production
  }
}
