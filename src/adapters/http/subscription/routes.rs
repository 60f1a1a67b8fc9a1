//! Axum routes for plans, subscriptions, the sweep trigger and gateway webhooks.

use axum::{
    routing::{get, post},
    Router,
};

use super::super::state::AppState;
use super::handlers::{
    cancel_current_subscription, cancel_subscription, get_subscription, handle_paytech_webhook,
    list_plans, renew_subscription, run_sweep, subscribe,
};

/// Routes for the authenticated subscriber.
///
/// - `GET /plans`
/// - `GET|POST|DELETE /subscription`
/// - `POST /subscription/renew`
/// - `POST /subscription/cancel`
pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route(
            "/subscription",
            get(get_subscription)
                .post(subscribe)
                .delete(cancel_current_subscription),
        )
        .route("/subscription/renew", post(renew_subscription))
        .route("/subscription/cancel", post(cancel_subscription))
}

/// The scheduler trigger. Mounted behind the cron secret guard.
pub fn sweep_routes() -> Router<AppState> {
    Router::new().route("/subscriptions/sweep", get(run_sweep).post(run_sweep))
}

/// Gateway callbacks. No user authentication.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/paytech", post(handle_paytech_webhook))
}
