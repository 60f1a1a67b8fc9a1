use axum::{
    routing::{get, post, put},
    Router,
};

use super::super::state::AppState;
use super::handlers::{list_notifications, mark_notification_read, publish_notification};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id/read", put(mark_notification_read))
}

/// Mounted under `/admin`.
pub fn admin_notification_routes() -> Router<AppState> {
    Router::new().route("/notifications", post(publish_notification))
}
