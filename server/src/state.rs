// comanda_server/src/state.rs

use crate::config::AppConfig;
use comanda::identity::{JwtConfig, JwtIdentity};
use comanda::intake::IntakeSettings;
use comanda::mailer::Mailer;
use comanda::payment::PaymentGateway;
use comanda::{Clock, OrderLifecycle, OrderStore, PaymentIntake, TokenVerifier};
use std::sync::Arc;

/// Everything handlers need, built once at startup and cloned per worker.
#[derive(Clone)]
pub struct AppState {
  pub lifecycle: OrderLifecycle,
  pub intake: Arc<PaymentIntake>,
  pub identity: Arc<JwtIdentity>,
  pub verifier: Arc<dyn TokenVerifier>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub clock: Arc<dyn Clock>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  pub fn new(
    config: Arc<AppConfig>,
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let lifecycle = OrderLifecycle::new(store, gateway.clone(), clock.clone());
    let settings = IntakeSettings {
      webhook_secret: config.stripe_webhook_secret.clone(),
      tolerance_secs: config.webhook_tolerance_secs,
    };
    let intake = PaymentIntake::new(lifecycle.clone(), Some(mailer), clock.clone(), settings);
    let identity = Arc::new(JwtIdentity::new(JwtConfig::with_secret(config.jwt_secret.clone())));
    Self {
      lifecycle,
      intake: Arc::new(intake),
      verifier: identity.clone(),
      identity,
      gateway,
      clock,
      config,
    }
  }
}
