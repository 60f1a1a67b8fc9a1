//! HTTP handlers for saved payment methods.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::handlers::{
    AddPaymentMethodCommand, DeletePaymentMethodCommand, ListPaymentMethodsQuery,
    SetDefaultPaymentMethodCommand,
};
use crate::domain::billing::PaymentChannel;
use crate::domain::foundation::{PaymentMethodId, Timestamp};

use super::super::error::ApiError;
use super::super::middleware::RequireAuth;
use super::super::state::AppState;
use super::dto::{AddPaymentMethodRequest, PaymentMethodResponse};

/// GET /api/payment-methods - Caller's saved methods, default first
pub async fn list_payment_methods(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let methods = state
        .list_payment_methods_handler()
        .handle(ListPaymentMethodsQuery { actor: user })
        .await?;

    let response: Vec<PaymentMethodResponse> = methods
        .into_iter()
        .map(PaymentMethodResponse::from)
        .collect();
    Ok(Json(response))
}

/// POST /api/payment-methods - Save a card or mobile-money account
pub async fn add_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<AddPaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = AddPaymentMethodCommand {
        actor: user,
        channel: request.method_type.parse::<PaymentChannel>()?,
        details: request.details,
        nickname: request.nickname,
        is_default: request.is_default,
        today: Timestamp::today(),
    };

    let method = state.add_payment_method_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(PaymentMethodResponse::from(method))))
}

/// DELETE /api/payment-methods/:id
pub async fn delete_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .delete_payment_method_handler()
        .handle(DeletePaymentMethodCommand {
            actor: user,
            payment_method_id: PaymentMethodId::from_uuid(id),
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/payment-methods/:id/default
pub async fn set_default_payment_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state
        .set_default_payment_method_handler()
        .handle(SetDefaultPaymentMethodCommand {
            actor: user,
            payment_method_id: PaymentMethodId::from_uuid(id),
        })
        .await?;

    Ok(Json(PaymentMethodResponse::from(method)))
}
