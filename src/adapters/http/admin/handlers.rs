//! HTTP handlers for administration reports.

use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use chrono::Datelike;

use crate::application::handlers::{GetPaymentSummaryQuery, ListActiveSubscriptionsQuery};
use crate::domain::foundation::Timestamp;

use super::super::error::ApiError;
use super::super::middleware::RequireAuth;
use super::super::state::AppState;
use super::dto::{ActiveSubscriptionResponse, PaymentSummaryResponse, SummaryParams};

/// GET /api/admin/subscriptions - All active subscriptions
pub async fn list_active_subscriptions(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let subscriptions = state
        .active_subscriptions_handler()
        .handle(ListActiveSubscriptionsQuery { actor: user })
        .await?;

    let response: Vec<ActiveSubscriptionResponse> = subscriptions
        .into_iter()
        .map(ActiveSubscriptionResponse::from)
        .collect();
    Ok(Json(response))
}

/// GET /api/admin/payments/summary?month&year
pub async fn payment_summary(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<SummaryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let today = Timestamp::today();
    let month = params.month.unwrap_or_else(|| today.month());
    let year = params.year.unwrap_or_else(|| today.year());

    let summary = state
        .payment_summary_handler()
        .handle(GetPaymentSummaryQuery {
            actor: user,
            month,
            year,
        })
        .await?;

    Ok(Json(PaymentSummaryResponse {
        month,
        year,
        summary,
    }))
}
