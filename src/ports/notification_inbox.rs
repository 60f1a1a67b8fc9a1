//! Notification fan-out store with per-recipient read state.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, NotificationId, UserId};
use crate::domain::notification::{Inbox, NewNotification};

/// Publishes notifications outside lifecycle transactions and serves
/// recipients' inboxes.
///
/// # Contract
///
/// - Broadcast notifications appear in every user's inbox
/// - Marking a broadcast read affects only the calling user
/// - `mark_read` returns false when the notification is not addressed to
///   the user (or does not exist)
#[async_trait]
pub trait NotificationInbox: Send + Sync {
    /// Returns false when the idempotency key is already taken.
    async fn publish(&self, notification: &NewNotification) -> Result<bool, DomainError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Inbox, DomainError>;

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, DomainError>;
}
