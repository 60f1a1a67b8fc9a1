//! Notification inbox handlers.

mod list_notifications;
mod mark_notification_read;
mod publish_notification;

pub use list_notifications::{
    ListNotificationsHandler, ListNotificationsQuery, ListNotificationsResult, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use mark_notification_read::{MarkNotificationReadCommand, MarkNotificationReadHandler};
pub use publish_notification::{
    PublishNotificationCommand, PublishNotificationHandler, PublishNotificationResult,
};
