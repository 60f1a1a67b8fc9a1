//! Message sender that only logs.
//!
//! Used when no SMS provider is configured.

use async_trait::async_trait;

use crate::ports::{MessageError, MessageSender};

#[derive(Debug, Clone, Default)]
pub struct LoggingMessageSender;

impl LoggingMessageSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessageError> {
        if to.trim().is_empty() {
            return Err(MessageError::InvalidDestination(to.to_string()));
        }
        tracing::info!(to = %to, body = %body, "SMS delivery disabled, message logged");
        Ok(())
    }
}
