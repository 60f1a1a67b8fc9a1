//! State machine trait for status enums.
//!
//! Subscription and payment statuses implement this trait so every lifecycle
//! change goes through one validated transition path.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for PaymentStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Pending, Completed) | (Pending, Failed))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Pending => vec![Completed, Failed],
///             Completed | Failed => vec![],
///         }
///     }
/// }
///
/// let settled = payment.status.transition_to(PaymentStatus::Completed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ticket {
        Open,
        Held,
        Closed,
    }

    impl StateMachine for Ticket {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Ticket::*;
            matches!((self, target), (Open, Held) | (Open, Closed) | (Held, Closed))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Ticket::*;
            match self {
                Open => vec![Held, Closed],
                Held => vec![Closed],
                Closed => vec![],
            }
        }
    }

    #[test]
    fn allowed_transition_returns_target() {
        assert_eq!(Ticket::Open.transition_to(Ticket::Held).unwrap(), Ticket::Held);
    }

    #[test]
    fn disallowed_transition_names_both_states() {
        let err = Ticket::Closed.transition_to(Ticket::Open).unwrap_err();
        assert!(err.to_string().contains("Closed"));
        assert!(err.to_string().contains("Open"));
    }

    #[test]
    fn closed_is_terminal() {
        assert!(Ticket::Closed.is_terminal());
        assert!(!Ticket::Held.is_terminal());
    }
}
