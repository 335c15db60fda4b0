// comanda/src/lifecycle/transitions.rs

use crate::error::{OrderError, OrderResult};
use crate::model::OrderStatus;

/// Legal next states from `from`. Terminal states have none.
pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
  use OrderStatus::*;
  match from {
    Pending => &[Received, Cancelled],
    Received => &[Preparing, Cancelled],
    Preparing => &[Ready],
    Ready => &[Completed],
    Completed | Cancelled => &[],
  }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
  allowed_targets(from).contains(&to)
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> OrderResult<()> {
  if can_transition(from, to) {
    Ok(())
  } else {
    Err(OrderError::InvalidTransition { from, to })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use OrderStatus::*;

  #[test]
  fn forward_chain_is_single_step() {
    assert!(can_transition(Pending, Received));
    assert!(can_transition(Received, Preparing));
    assert!(can_transition(Preparing, Ready));
    assert!(can_transition(Ready, Completed));

    assert!(!can_transition(Pending, Preparing));
    assert!(!can_transition(Received, Ready));
    assert!(!can_transition(Ready, Preparing));
  }

  #[test]
  fn cancellation_stops_at_preparing() {
    assert!(can_transition(Pending, Cancelled));
    assert!(can_transition(Received, Cancelled));
    assert!(!can_transition(Preparing, Cancelled));
    assert!(!can_transition(Ready, Cancelled));
  }

  #[test]
  fn terminal_states_go_nowhere() {
    for to in OrderStatus::ALL {
      assert!(!can_transition(Completed, to));
      assert!(!can_transition(Cancelled, to));
    }
    assert!(matches!(
      ensure_transition(Completed, Pending),
      Err(OrderError::InvalidTransition { from: Completed, to: Pending })
    ));
  }

  #[test]
  fn advance_steps_agree_with_the_table() {
    for from in OrderStatus::ALL {
      if let Some(next) = from.next_step() {
        assert!(can_transition(from, next));
      }
    }
  }
}
