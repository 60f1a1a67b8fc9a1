//! Ports - interfaces between the application core and infrastructure.
//!
//! - `BillingStore` / `BillingTransaction` - transactional lifecycle writes
//! - `BillingReader` - read-side queries and admin figures
//! - `NotificationInbox` - notification fan-out and read state
//! - `PaymentGateway` - hosted payment sessions
//! - `MessageSender` - SMS receipts
//! - `SessionValidator` - bearer token validation

mod billing_reader;
mod billing_store;
mod message_sender;
mod notification_inbox;
mod payment_gateway;
mod session_validator;

pub use billing_reader::{BillingReader, PaymentSummary};
pub use billing_store::{BillingStore, BillingTransaction};
pub use message_sender::{MessageError, MessageSender};
pub use notification_inbox::NotificationInbox;
pub use payment_gateway::{
    GatewayError, GatewayErrorCode, GatewayPaymentRequest, GatewaySession, PaymentGateway,
};
pub use session_validator::SessionValidator;
