//! Payment gateway port.
//!
//! The gateway is asked for a hosted payment session for a locally generated
//! transaction reference. Settlement is reported later through the webhook,
//! so this port never confirms funds by itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{BillingError, PaymentMethodKind, TransactionReference};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session.
    ///
    /// # Errors
    ///
    /// - `GatewayErrorCode::Timeout` when no answer arrives in time; the
    ///   gateway may still process the request
    /// - `GatewayErrorCode::Rejected` when the gateway refuses the request
    async fn request_payment(
        &self,
        request: &GatewayPaymentRequest,
    ) -> Result<GatewaySession, GatewayError>;
}

/// Payment session request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPaymentRequest {
    /// Sent as `ref_command` and echoed back by the webhook.
    pub reference: TransactionReference,
    /// Integer amount in the smallest currency unit.
    pub amount: i64,
    pub item_name: String,
    pub method: PaymentMethodKind,
    /// Mobile-money operator name, when paying by mobile money.
    pub provider: Option<String>,
    pub phone: Option<String>,
}

/// Hosted session returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    NetworkError,
    Timeout,
    Rejected,
    InvalidResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Rejected, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidResponse, message)
    }

    /// The request may have reached the gateway; outcome unknown.
    pub fn is_timeout(&self) -> bool {
        self.code == GatewayErrorCode::Timeout
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        if err.is_timeout() {
            BillingError::GatewayTimeout(err.message)
        } else {
            BillingError::GatewayRejected(err.message)
        }
    }
}
