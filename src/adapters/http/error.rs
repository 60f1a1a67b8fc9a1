//! Error bodies and the mapping from `BillingError` to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::billing::BillingError;
use crate::domain::foundation::{DomainError, ValidationError};

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(BillingError::from(err))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::Validation { .. } | BillingError::GatewayRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            BillingError::Unauthorized => StatusCode::UNAUTHORIZED,
            BillingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BillingError::PlanNotFound(_)
            | BillingError::SubscriptionNotFound(_)
            | BillingError::NoActiveSubscription
            | BillingError::PaymentMethodNotFound(_)
            | BillingError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::InvalidState { .. } | BillingError::Conflict(_) => StatusCode::CONFLICT,
            BillingError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BillingError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse::new(self.0.code().to_string(), self.0.message());

        let missing = self.0.missing_fields();
        if !missing.is_empty() {
            body = body.with_details(serde_json::json!({ "missing_fields": missing }));
        }

        if status.is_server_error() {
            tracing::error!(error_code = %body.error_code, error = %body.message, "request failed");
        }

        (status, Json(body)).into_response()
    }
}
