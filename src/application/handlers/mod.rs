//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod admin;
pub mod notification;
pub mod payment_method;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin::*;
pub use notification::*;
pub use payment_method::*;
pub use subscription::*;
