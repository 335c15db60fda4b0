// comanda/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural modification methods.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::context_data::ContextData;
use super::control::PipelineControl;
use super::step::StepDef;
use crate::error::OrderError;

/// A step handler: takes a clone of the shared context, resolves to a control signal.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

/// An ordered set of named steps over a root context `TData`.
///
/// `Err` must absorb `OrderError` so the runner can report configuration faults
/// (a required step with no handlers) through the same channel as handler failures.
pub struct Pipeline<TData, Err = OrderError>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<OrderError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<OrderError> + Send + Sync + 'static,
{
  pub fn new(steps: Vec<StepDef<TData>>) -> Self {
    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Shorthand for `(name, optional)` pairs without skip conditions.
  pub fn from_names(step_defs: &[(&str, bool)]) -> Self {
    Self::new(
      step_defs
        .iter()
        .map(|(name, optional)| StepDef {
          name: (*name).to_string(),
          optional: *optional,
          skip_if: None,
        })
        .collect(),
    )
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  /// Panics on an unknown step name. A typo here is a wiring bug, not a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) -> usize {
    match self.position(step_name) {
      Some(idx) => idx,
      None => panic!("comanda setup error: step '{}' not found in pipeline definition", step_name),
    }
  }

  fn ensure_step_not_exists(&self, step_name: &str) {
    if self.position(step_name).is_some() {
      panic!("comanda setup error: step '{}' already exists in pipeline definition", step_name);
    }
  }

  pub fn insert_before_step(&mut self, existing_step_name: &str, step: StepDef<TData>) {
    let idx = self.ensure_step_exists(existing_step_name);
    self.ensure_step_not_exists(&step.name);
    self.steps.insert(idx, step);
  }

  pub fn insert_after_step(&mut self, existing_step_name: &str, step: StepDef<TData>) {
    let idx = self.ensure_step_exists(existing_step_name);
    self.ensure_step_not_exists(&step.name);
    self.steps.insert(idx + 1, step);
  }

  /// Removing an unknown step is a no-op.
  pub fn remove_step(&mut self, step_name: &str) {
    if let Some(idx) = self.position(step_name) {
      self.steps.remove(idx);
      self.before.remove(step_name);
      self.on.remove(step_name);
      self.after.remove(step_name);
    }
  }
}
