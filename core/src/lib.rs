// comanda/src/lib.rs

//! Comanda: order lifecycle and payment reconciliation for a restaurant ordering service.
//!
//! The crate covers the part of the ordering system that carries real invariants:
//!  - An order store contract with an idempotency key (the payment session id)
//!    and status-guarded, single-document updates.
//!  - A lifecycle engine driving `pending → received → preparing → ready → completed`
//!    plus cancellation, with a time-boxed customer self-cancel and refund.
//!  - Payment intake: a named-step pipeline turning a signed "checkout completed"
//!    webhook into exactly one order, with best-effort confirmation email.
//!  - The chunked metadata codec used to smuggle item lists through small
//!    payment-processor metadata fields.
//!  - The staff approval workflow: new-pending detection over polled snapshots,
//!    a repeating alarm, the "accepting orders" gate and bulk accept.

pub mod approval;
pub mod clock;
pub mod error;
pub mod identity;
pub mod intake;
pub mod lifecycle;
pub mod mailer;
pub mod model;
pub mod payment;
pub mod pipeline;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{OrderError, OrderResult};
pub use crate::identity::{Principal, Role, TokenVerifier};
pub use crate::model::{LineItem, NewOrder, Order, OrderId, OrderRef, OrderStatus, StatusEntry};
pub use crate::store::{OrderQuery, OrderStore};

pub use crate::lifecycle::{LifecyclePolicy, OrderLifecycle};
pub use crate::intake::{IntakeOutcome, PaymentIntake};
pub use crate::approval::{ApprovalWorkflow, BulkReport, StaffOrders, TickReport};

pub use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineResult};

/*
    Request flow:
    1. Payment processor posts "checkout.session.completed" → `PaymentIntake::handle`
       verifies the signature, reassembles the item metadata and calls
       `OrderLifecycle::create` keyed by the session id (duplicates are a no-op).
    2. Kitchen/admin staff poll the order list through an `ApprovalWorkflow`,
       which raises alerts for new pending orders and drives accept/reject.
    3. Staff walk an order through `advance` until `completed`; the customer may
       self-cancel (with refund) for two minutes after placing it.
*/
