//! ListNotificationsHandler - Query handler for the caller's inbox.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::AuthenticatedUser;
use crate::domain::notification::Inbox;
use crate::ports::NotificationInbox;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ListNotificationsQuery {
    pub actor: AuthenticatedUser,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub type ListNotificationsResult = Inbox;

/// Any authenticated user may read their own inbox.
pub struct ListNotificationsHandler {
    inbox: Arc<dyn NotificationInbox>,
}

impl ListNotificationsHandler {
    pub fn new(inbox: Arc<dyn NotificationInbox>) -> Self {
        Self { inbox }
    }

    pub async fn handle(
        &self,
        query: ListNotificationsQuery,
    ) -> Result<ListNotificationsResult, BillingError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        self.inbox
            .list_for_user(query.actor.id, limit, offset)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))
    }
}
