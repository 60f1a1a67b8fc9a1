//! MarkNotificationReadHandler - Command handler for read receipts.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{AuthenticatedUser, NotificationId};
use crate::ports::NotificationInbox;

#[derive(Debug, Clone)]
pub struct MarkNotificationReadCommand {
    pub actor: AuthenticatedUser,
    pub notification_id: NotificationId,
}

pub struct MarkNotificationReadHandler {
    inbox: Arc<dyn NotificationInbox>,
}

impl MarkNotificationReadHandler {
    pub fn new(inbox: Arc<dyn NotificationInbox>) -> Self {
        Self { inbox }
    }

    pub async fn handle(&self, cmd: MarkNotificationReadCommand) -> Result<(), BillingError> {
        let found = self
            .inbox
            .mark_read(cmd.actor.id, cmd.notification_id)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))?;

        if !found {
            return Err(BillingError::NotificationNotFound(cmd.notification_id));
        }
        Ok(())
    }
}
