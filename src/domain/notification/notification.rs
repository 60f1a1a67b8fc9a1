//! Notifications fanned out to recipients.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::Subscription;
use crate::domain::foundation::{NotificationId, Timestamp, UserId, ValidationError};

use super::SubscriptionEvent;

/// Who receives a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "user_ids", rename_all = "snake_case")]
pub enum Audience {
    Users(Vec<UserId>),
    Broadcast,
}

/// A notification about to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub id: NotificationId,
    pub label: String,
    pub kind: String,
    pub description: String,
    pub emitter_id: Option<UserId>,
    pub audience: Audience,
    /// Publishing twice with the same key stores the notification once.
    pub idempotency_key: Option<String>,
}

impl NewNotification {
    pub fn new(
        label: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        emitter_id: Option<UserId>,
        audience: Audience,
    ) -> Result<Self, ValidationError> {
        let label = label.into();
        let kind = kind.into();
        if label.trim().is_empty() {
            return Err(ValidationError::empty_field("label"));
        }
        if kind.trim().is_empty() {
            return Err(ValidationError::empty_field("type"));
        }
        if matches!(&audience, Audience::Users(users) if users.is_empty()) {
            return Err(ValidationError::empty_field("recipients"));
        }
        Ok(Self {
            id: NotificationId::new(),
            label,
            kind,
            description: description.into(),
            emitter_id,
            audience,
            idempotency_key: None,
        })
    }

    /// Lifecycle notification addressed to the subscription owner.
    pub fn for_subscription(
        event: SubscriptionEvent,
        subscription: &Subscription,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            label: event.label().to_string(),
            kind: event.kind().to_string(),
            description: event.describe(subscription, today),
            emitter_id: None,
            audience: Audience::Users(vec![subscription.user_id]),
            idempotency_key: None,
        }
    }

    /// Keys the notification by `(subscription, type, day)` so repeated
    /// sweeps on the same day publish it once.
    pub fn once_per_day(mut self, subscription: &Subscription, day: NaiveDate) -> Self {
        self.idempotency_key = Some(format!(
            "subscription:{}:{}:{}",
            subscription.id, self.kind, day
        ));
        self
    }

    pub fn recipients(&self) -> &[UserId] {
        match &self.audience {
            Audience::Users(users) => users,
            Audience::Broadcast => &[],
        }
    }
}

/// A notification as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: NotificationId,
    pub label: String,
    pub kind: String,
    pub description: String,
    pub emitter_id: Option<UserId>,
    pub broadcast: bool,
    pub read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// One page of a recipient's notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    pub entries: Vec<InboxEntry>,
    pub total: u64,
    pub unread: u64,
}
