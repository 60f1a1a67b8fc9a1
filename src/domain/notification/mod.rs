//! Notification domain - fan-out messages with per-recipient read state.

mod event;
mod notification;

pub use event::SubscriptionEvent;
pub use notification::{Audience, Inbox, InboxEntry, NewNotification};
