// comanda_server/src/db/mod.rs

pub mod pg_store;

pub use pg_store::PgOrderStore;

use sqlx::migrate::Migrator;
use sqlx::PgPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects and brings the schema up to date.
pub async fn connect_and_migrate(database_url: &str) -> crate::errors::Result<PgPool> {
  let pool = PgPool::connect(database_url).await?;
  MIGRATOR
    .run(&pool)
    .await
    .map_err(|e| crate::errors::AppError::Internal(format!("Database migration failed: {}", e)))?;
  tracing::info!("Database migrations applied.");
  Ok(pool)
}
