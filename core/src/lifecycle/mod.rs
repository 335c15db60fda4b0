// comanda/src/lifecycle/mod.rs

//! The order state machine and the engine that drives it against a store.

pub mod engine;
pub mod transitions;

pub use engine::{LifecyclePolicy, OrderLifecycle, CUSTOMER_CANCEL_NOTE, SANDBOX_REFUND_ID};
pub use transitions::{allowed_targets, can_transition, ensure_transition};
