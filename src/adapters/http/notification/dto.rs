//! Request and response DTOs for notifications.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{NotificationId, UserId, ValidationError};
use crate::domain::notification::Audience;

/// Query string of `GET /api/notifications`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Body of `POST /api/admin/notifications`.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishNotificationRequest {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recipients: Option<Vec<i64>>,
    #[serde(default)]
    pub broadcast: bool,
}

impl PublishNotificationRequest {
    /// `broadcast` wins over an explicit recipient list.
    pub fn audience(&self) -> Result<Audience, ValidationError> {
        if self.broadcast {
            return Ok(Audience::Broadcast);
        }
        let users = self
            .recipients
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|id| UserId::new(*id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Audience::Users(users))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishNotificationResponse {
    pub id: NotificationId,
}
