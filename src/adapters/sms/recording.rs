//! Message sender that records messages for assertions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{MessageError, MessageSender};

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct RecordingMessageSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMessageSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail with a provider error.
    pub fn fail_all(&self) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Waits until at least `count` messages were recorded, or `timeout`
    /// elapsed. Receipts are sent from spawned tasks.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl MessageSender for RecordingMessageSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessageError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(MessageError::Provider("simulated failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                to: to.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}
