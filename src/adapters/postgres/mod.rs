//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresBillingStore` - Transactional lifecycle writes
//! - `PostgresBillingReader` - Read-optimized billing queries
//! - `PostgresNotificationInbox` - Notification fan-out and read state
//!
//! Schema lives in `migrations/` at the crate root.

mod billing_reader;
mod billing_store;
mod notification_inbox;
mod rows;

pub use billing_reader::PostgresBillingReader;
pub use billing_store::PostgresBillingStore;
pub use notification_inbox::PostgresNotificationInbox;
