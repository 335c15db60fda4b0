// comanda_server/src/lib.rs

//! HTTP surface for the comanda order core: Postgres storage, Stripe and
//! Resend clients, staff login and the JSON API.

pub mod config;
pub mod db;
pub mod errors;
pub mod services;
pub mod state;
pub mod web;

pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use state::AppState;
