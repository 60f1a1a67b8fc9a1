//! Billing error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | Unauthorized | 401 |
//! | Forbidden | 403 |
//! | PlanNotFound / SubscriptionNotFound / NoActiveSubscription | 404 |
//! | PaymentMethodNotFound / NotificationNotFound | 404 |
//! | InvalidState / Conflict | 409 |
//! | GatewayRejected | 400 |
//! | GatewayTimeout | 504 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    AuthError, DomainError, ErrorCode, NotificationId, PaymentMethodId, PlanId, SubscriptionId,
    ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// Input was missing or malformed. `missing_fields` lists absent fields.
    Validation {
        message: String,
        missing_fields: Vec<String>,
    },

    Unauthorized,

    /// Caller is authenticated but may not perform the operation.
    Forbidden(String),

    /// Plan does not exist, is inactive, or targets another role.
    PlanNotFound(PlanId),

    /// Subscription does not exist or belongs to another user.
    SubscriptionNotFound(SubscriptionId),

    /// The caller has no active subscription.
    NoActiveSubscription,

    PaymentMethodNotFound(PaymentMethodId),

    NotificationNotFound(NotificationId),

    InvalidState {
        current: String,
        attempted: String,
    },

    Conflict(String),

    /// The gateway refused the payment request.
    GatewayRejected(String),

    /// The gateway did not answer in time; the payment stays pending.
    GatewayTimeout(String),

    Infrastructure(String),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation {
            message: message.into(),
            missing_fields: Vec::new(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        BillingError::Forbidden(reason.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::Validation { .. } => ErrorCode::ValidationFailed,
            BillingError::Unauthorized => ErrorCode::Unauthorized,
            BillingError::Forbidden(_) => ErrorCode::Forbidden,
            BillingError::PlanNotFound(_) => ErrorCode::PlanNotFound,
            BillingError::SubscriptionNotFound(_) | BillingError::NoActiveSubscription => {
                ErrorCode::SubscriptionNotFound
            }
            BillingError::PaymentMethodNotFound(_) => ErrorCode::PaymentMethodNotFound,
            BillingError::NotificationNotFound(_) => ErrorCode::NotificationNotFound,
            BillingError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            BillingError::Conflict(_) => ErrorCode::Conflict,
            BillingError::GatewayRejected(_) => ErrorCode::GatewayRejected,
            BillingError::GatewayTimeout(_) => ErrorCode::GatewayTimeout,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn message(&self) -> String {
        match self {
            BillingError::Validation { message, .. } => message.clone(),
            BillingError::Unauthorized => "Authentication required".to_string(),
            BillingError::Forbidden(reason) => format!("Access denied: {}", reason),
            BillingError::PlanNotFound(id) => format!("Plan not found or not available: {}", id),
            BillingError::SubscriptionNotFound(id) => format!("Subscription not found: {}", id),
            BillingError::NoActiveSubscription => "No active subscription".to_string(),
            BillingError::PaymentMethodNotFound(id) => {
                format!("Payment method not found: {}", id)
            }
            BillingError::NotificationNotFound(id) => format!("Notification not found: {}", id),
            BillingError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in state {}", attempted, current)
            }
            BillingError::Conflict(message) => message.clone(),
            BillingError::GatewayRejected(message) => {
                format!("Payment gateway rejected the request: {}", message)
            }
            BillingError::GatewayTimeout(message) => {
                format!("Payment gateway did not respond: {}", message)
            }
            BillingError::Infrastructure(message) => format!("Internal error: {}", message),
        }
    }

    /// Missing field names for validation errors.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            BillingError::Validation { missing_fields, .. } => missing_fields,
            _ => &[],
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::GatewayTimeout(_) | BillingError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::Validation {
            missing_fields: err.missing().to_vec(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::validation(err.message),
            ErrorCode::InvalidStateTransition => BillingError::InvalidState {
                current: err
                    .details
                    .get("current")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                attempted: err
                    .details
                    .get("attempted")
                    .cloned()
                    .unwrap_or_else(|| err.message.clone()),
            },
            ErrorCode::Conflict => BillingError::Conflict(err.message),
            ErrorCode::Unauthorized => BillingError::Unauthorized,
            ErrorCode::Forbidden => BillingError::Forbidden(err.message),
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<AuthError> for BillingError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => BillingError::forbidden(err.to_string()),
            AuthError::InvalidToken | AuthError::TokenExpired => BillingError::Unauthorized,
            AuthError::ServiceUnavailable(message) => BillingError::Infrastructure(message),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
