use axum::{routing::get, Router};

use super::super::state::AppState;
use super::handlers::{list_active_subscriptions, payment_summary};

/// Mounted under `/admin`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_active_subscriptions))
        .route("/payments/summary", get(payment_summary))
}
