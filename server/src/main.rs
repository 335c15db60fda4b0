// comanda_server/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use comanda::mailer::Mailer;
use comanda::SystemClock;
use comanda_server::db::{self, PgOrderStore};
use comanda_server::services::{LogMailer, ResendMailer, StripeGateway};
use comanda_server::web::configure_app_routes;
use comanda_server::{AppConfig, AppState};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting comanda order server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };
  tracing::debug!(config = ?app_config, "Loaded config details");

  let db_pool = match db::connect_and_migrate(&app_config.database_url).await {
    Ok(pool) => {
      tracing::info!("Successfully connected to the database.");
      pool
    }
    Err(e) => {
      tracing::error!(error = %e, "Failed to connect to the database.");
      return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string()));
    }
  };

  let mailer: Arc<dyn Mailer> = match &app_config.resend_api_key {
    Some(key) => Arc::new(ResendMailer::new(key.clone(), app_config.email_sender.clone())),
    None => Arc::new(LogMailer),
  };

  let app_state = AppState::new(
    app_config.clone(),
    Arc::new(PgOrderStore::new(db_pool)),
    Arc::new(StripeGateway::new(app_config.stripe_secret_key.clone())),
    mailer,
    Arc::new(SystemClock),
  );
  tracing::info!(steps = ?app_state.intake.step_names(), "Payment intake pipeline ready.");

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
