// comanda_server/src/web/handlers/mod.rs

pub mod auth_handlers;
pub mod checkout_handlers;
pub mod orders_handlers;
pub mod webhook_handlers;
