//! Shared-secret guard for scheduler-triggered endpoints.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use super::auth::bearer_token;
use super::super::error::ErrorResponse;

/// Cron middleware state - the configured bearer secret.
pub type CronState = Arc<SecretString>;

/// Rejects the request with 401 unless it carries
/// `Authorization: Bearer <cron secret>`.
pub async fn require_cron_secret(
    State(secret): State<CronState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = bearer_token(request.headers())
        .map(|token| secret_matches(secret.expose_secret(), token))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "rejected cron request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("UNAUTHORIZED", "Invalid cron secret")),
        )
            .into_response();
    }

    next.run(request).await
}

fn secret_matches(expected: &str, presented: &str) -> bool {
    // ct_eq on slices of unequal length returns false without leaking where they differ.
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
}
