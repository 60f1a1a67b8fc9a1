//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, time, errors, auth)
//! - `billing` - Plans, subscriptions, payments and saved payment methods
//! - `notification` - Lifecycle notifications and recipient inboxes

pub mod billing;
pub mod foundation;
pub mod notification;
