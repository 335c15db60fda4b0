// comanda/src/pipeline/mod.rs

//! A small named-step pipeline runner.
//!
//! A `Pipeline<TData, Err>` is an ordered list of named steps. Each step carries
//! `before`, `on` and `after` handlers that receive a shared [`ContextData<TData>`]
//! and return a [`PipelineControl`]. Steps can be optional (no handlers is fine)
//! or skipped by a predicate over the context. Payment intake is built on this.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;
pub mod hooks;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::{Handler, Pipeline};
pub use step::{SkipCondition, StepDef};
