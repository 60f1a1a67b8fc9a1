//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, time values, error types and the state machine
//! trait that form the vocabulary of the subscription domain.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser, Role};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{NotificationId, PaymentId, PaymentMethodId, PlanId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
