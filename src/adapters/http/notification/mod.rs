//! HTTP adapter for notifications.
//!
//! - `GET /api/notifications` - Paged inbox with unread count
//! - `PUT /api/notifications/:id/read` - Mark one notification read
//! - `POST /api/admin/notifications` - Publish an announcement (admin)

pub mod dto;
pub mod handlers;
pub mod routes;

pub use routes::{admin_notification_routes, notification_routes};
