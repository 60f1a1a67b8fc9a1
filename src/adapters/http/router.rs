//! Assembles the HTTP surface: route groups, guards and tower-http layers.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

use super::admin::admin_routes;
use super::middleware::{auth_middleware, require_cron_secret};
use super::notification::{admin_notification_routes, notification_routes};
use super::payment_method::payment_method_routes;
use super::state::AppState;
use super::subscription::{subscription_routes, sweep_routes, webhook_routes};

/// Routes mounted under `/api`, each group behind its own guard.
///
/// - user and admin routes: bearer token via `auth_middleware`
/// - sweep trigger: cron secret
/// - gateway webhooks: no guard
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .merge(subscription_routes())
        .merge(payment_method_routes())
        .merge(notification_routes())
        .nest("/admin", admin_routes().merge(admin_notification_routes()))
        .route_layer(middleware::from_fn_with_state(
            state.session_validator.clone(),
            auth_middleware,
        ));

    let scheduled = sweep_routes().route_layer(middleware::from_fn_with_state(
        state.cron_secret.clone(),
        require_cron_secret,
    ));

    Router::new()
        .merge(authenticated)
        .merge(scheduled)
        .merge(webhook_routes())
}

/// The complete application with middleware layers applied.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(server))
        .layer(CompressionLayer::new());

    Router::new()
        .nest("/api", api_routes(&state))
        .route("/health", get(health))
        .layer(middleware)
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        if server.is_production() {
            return CorsLayer::new();
        }
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /health - liveness
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
