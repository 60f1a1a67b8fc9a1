//! HTTP handlers for plans, the subscription lifecycle, the gateway webhook
//! and the reconciliation sweep trigger.

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::adapters::paytech::PaytechIpn;
use crate::application::handlers::{
    CancelSubscriptionCommand, GetSubscriptionOverviewQuery, HandleGatewayWebhookCommand,
    ListPlansQuery, PaymentSource, ReconciliationSweepCommand, RenewSubscriptionCommand,
    SubscribeCommand,
};
use crate::domain::billing::PaymentChannel;
use crate::domain::foundation::{
    AuthenticatedUser, PaymentMethodId, PlanId, SubscriptionId, Timestamp, ValidationError,
};

use super::super::error::ApiError;
use super::super::middleware::RequireAuth;
use super::super::state::AppState;
use super::dto::{
    CancelRequest, CancelResponse, CheckoutResponse, OverviewResponse, PlanResponse,
    RenewRequest, SubscribeRequest, WebhookAck,
};

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/plans - Active plans for the caller's role
pub async fn list_plans(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let plans = state
        .list_plans_handler()
        .handle(ListPlansQuery { role: user.role })
        .await?;

    let response: Vec<PlanResponse> = plans.into_iter().map(PlanResponse::from).collect();
    Ok(Json(response))
}

/// GET /api/subscription - Current subscription and recent history
pub async fn get_subscription(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .overview_handler()
        .handle(GetSubscriptionOverviewQuery {
            actor: user,
            today: Timestamp::today(),
        })
        .await?;

    Ok(Json(OverviewResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscription - Subscribe to a plan and start payment
pub async fn subscribe(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = SubscribeCommand {
        actor: user,
        plan_id: PlanId::from_uuid(request.plan_id),
        payment_method: request.payment_method.parse::<PaymentChannel>()?,
        details: request.details,
        auto_renew: request.auto_renew,
        save_method: request.save_method,
        today: Timestamp::today(),
    };

    let result = state.subscribe_handler().handle(cmd).await?;

    let response = CheckoutResponse {
        subscription: result.subscription.into(),
        payment: result.payment.into(),
        redirect_url: result.redirect_url,
        saved_method_id: result.saved_method_id,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/subscription/renew - Extend a subscription by one plan period
pub async fn renew_subscription(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<RenewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = match (request.saved_method_id, request.payment_method) {
        (Some(id), _) => PaymentSource::Saved(PaymentMethodId::from_uuid(id)),
        (None, Some(channel)) => PaymentSource::Fresh {
            channel: channel.parse::<PaymentChannel>()?,
            details: request.details,
        },
        (None, None) => {
            return Err(ValidationError::missing_fields(["payment_method"]).into());
        }
    };

    let cmd = RenewSubscriptionCommand {
        actor: user,
        subscription_id: SubscriptionId::from_uuid(request.subscription_id),
        source,
        today: Timestamp::today(),
    };

    let result = state.renew_handler().handle(cmd).await?;

    let response = CheckoutResponse {
        subscription: result.subscription.into(),
        payment: result.payment.into(),
        redirect_url: result.redirect_url,
        saved_method_id: None,
    };
    Ok(Json(response))
}

/// POST /api/subscription/cancel - Cancel now or at the end of the period
pub async fn cancel_subscription(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    cancel(state, user, request).await
}

/// DELETE /api/subscription - Cancel the current subscription immediately
pub async fn cancel_current_subscription(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let request = CancelRequest {
        immediate: true,
        ..CancelRequest::default()
    };
    cancel(state, user, request).await
}

async fn cancel(
    state: AppState,
    user: AuthenticatedUser,
    request: CancelRequest,
) -> Result<Json<CancelResponse>, ApiError> {
    let cmd = CancelSubscriptionCommand {
        actor: user,
        subscription_id: request.subscription_id.map(SubscriptionId::from_uuid),
        immediate: request.immediate,
        reason: request.reason,
        today: Timestamp::today(),
    };

    let result = state.cancel_handler().handle(cmd).await?;

    Ok(Json(CancelResponse {
        subscription: result.subscription.into(),
        active_until: result.active_until,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Gateway Webhook (no user auth)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/paytech - Payment notification from PayTech
///
/// Always answers 200 so the gateway stops retrying; failures are logged.
pub async fn handle_paytech_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    let ipn = match PaytechIpn::parse(&body) {
        Ok(ipn) => ipn,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed payment notification");
            return (StatusCode::OK, Json(WebhookAck::not_processed(e.to_string())));
        }
    };

    if let Some(verifier) = &state.ipn_verifier {
        if let Err(e) = verifier.verify(&ipn) {
            tracing::warn!(
                transaction_id = %ipn.reference(),
                error = %e,
                "ignoring unauthenticated payment notification"
            );
            return (StatusCode::OK, Json(WebhookAck::not_processed(e.to_string())));
        }
    }

    let cmd = HandleGatewayWebhookCommand {
        reference: ipn.reference().to_string(),
        outcome: ipn.outcome(),
        today: Timestamp::today(),
    };

    match state.webhook_handler().handle(cmd).await {
        Ok(result) => {
            tracing::info!(transaction_id = %ipn.reference(), ?result, "payment notification handled");
            (StatusCode::OK, Json(WebhookAck::processed("Notification processed")))
        }
        Err(e) => {
            tracing::error!(
                transaction_id = %ipn.reference(),
                error = %e.message(),
                "payment notification failed"
            );
            (StatusCode::OK, Json(WebhookAck::not_processed(e.message())))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Scheduler Trigger (cron secret)
// ════════════════════════════════════════════════════════════════════════════════

/// GET|POST /api/subscriptions/sweep - Daily reminders, expiry and auto-renewal
pub async fn run_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .sweep_handler()
        .handle(ReconciliationSweepCommand {
            today: Timestamp::today(),
        })
        .await?;

    tracing::info!(
        expiring_soon = result.expiring_soon,
        expiring_today = result.expiring_today,
        expired = result.expired,
        auto_renewed = result.auto_renewed,
        auto_renew_failed = result.auto_renew_failed,
        "reconciliation sweep finished"
    );
    Ok(Json(result))
}
