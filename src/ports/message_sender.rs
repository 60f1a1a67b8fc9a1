//! Outbound text message port (SMS receipts).
//!
//! Sending is fire-and-forget from the caller's point of view: failures are
//! logged by the caller and never abort the operation that produced them.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MessageError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Message provider error: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `body` to the phone number `to`.
    async fn send(&self, to: &str, body: &str) -> Result<(), MessageError>;
}
