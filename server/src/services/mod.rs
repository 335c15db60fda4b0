// comanda_server/src/services/mod.rs

pub mod auth_service;
pub mod email;
pub mod kitchen_client;
pub mod stripe;

pub use email::{LogMailer, ResendMailer};
pub use kitchen_client::HttpStaffOrders;
pub use stripe::StripeGateway;
