//! In-memory adapters.
//!
//! Used by the test suites and for running the service without a database.

mod billing_store;

pub use billing_store::{FailPoint, InMemoryBillingStore, StoredNotification};
