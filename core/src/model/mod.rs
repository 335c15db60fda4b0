// comanda/src/model/mod.rs

//! Order entity and its status enumeration.

pub mod order;
pub mod status;

pub use order::{items_total, CustomerSnapshot, LineItem, NewOrder, Order, OrderId, OrderRef, StatusEntry, DEFAULT_PREP_TIME_MINUTES};
pub use status::OrderStatus;
