//! PublishNotificationHandler - Command handler for admin announcements.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{AuthenticatedUser, NotificationId, Role};
use crate::domain::notification::{Audience, NewNotification};
use crate::ports::NotificationInbox;

#[derive(Debug, Clone)]
pub struct PublishNotificationCommand {
    pub actor: AuthenticatedUser,
    pub label: String,
    pub kind: String,
    pub description: String,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishNotificationResult {
    pub notification_id: NotificationId,
}

/// Publishes a notification to a list of users or to everyone.
pub struct PublishNotificationHandler {
    inbox: Arc<dyn NotificationInbox>,
}

impl PublishNotificationHandler {
    pub fn new(inbox: Arc<dyn NotificationInbox>) -> Self {
        Self { inbox }
    }

    pub async fn handle(
        &self,
        cmd: PublishNotificationCommand,
    ) -> Result<PublishNotificationResult, BillingError> {
        cmd.actor.require_role(Role::Admin)?;

        let notification = NewNotification::new(
            cmd.label,
            cmd.kind,
            cmd.description,
            Some(cmd.actor.id),
            cmd.audience,
        )?;

        self.inbox
            .publish(&notification)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))?;

        tracing::info!(
            notification_id = %notification.id,
            kind = %notification.kind,
            broadcast = matches!(notification.audience, Audience::Broadcast),
            recipients = notification.recipients().len(),
            "Notification published"
        );

        Ok(PublishNotificationResult {
            notification_id: notification.id,
        })
    }
}
