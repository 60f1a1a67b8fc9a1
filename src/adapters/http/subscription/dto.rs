//! Request and response DTOs for the subscription endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::handlers::{CurrentSubscription, GetSubscriptionOverviewResult};
use crate::domain::billing::{
    LifecyclePhase, Payment, PaymentMethodKind, PaymentPurpose, PaymentStatus, Plan,
    RawPaymentDetails, Subscription, SubscriptionStatus,
};
use crate::domain::foundation::{PaymentId, PaymentMethodId, PlanId, SubscriptionId, Timestamp};

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/subscription`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: Uuid,
    /// `card` or `mobile_money`.
    pub payment_method: String,
    #[serde(flatten)]
    pub details: RawPaymentDetails,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub save_method: bool,
}

/// Body of `POST /api/subscription/renew`.
///
/// Either `saved_method_id` or `payment_method` with its details.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewRequest {
    pub subscription_id: Uuid,
    #[serde(default)]
    pub saved_method_id: Option<Uuid>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(flatten)]
    pub details: RawPaymentDetails,
}

/// Body of `POST /api/subscription/cancel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
    #[serde(default)]
    pub immediate: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub id: PlanId,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_days: u32,
    pub features: Vec<String>,
    pub price_per_day: f64,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        let price_per_day = plan.price_per_day();
        Self {
            id: plan.id,
            name: plan.name,
            description: plan.description,
            price: plan.price,
            duration_days: plan.duration_days,
            features: plan.features,
            price_per_day,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub plan_id: PlanId,
    pub plan_name: String,
    pub price: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub payment_id: Option<PaymentId>,
    pub canceled_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
    pub created_at: Timestamp,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            plan_id: s.plan_id,
            plan_name: s.plan_name,
            price: s.price,
            start_date: s.start_date,
            end_date: s.end_date,
            status: s.status,
            auto_renew: s.auto_renew,
            payment_id: s.payment_id,
            canceled_at: s.canceled_at,
            cancellation_reason: s.cancellation_reason,
            created_at: s.created_at,
        }
    }
}

/// Payment as shown to its owner. Card tokens and gateway tokens stay server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub amount: i64,
    pub method: PaymentMethodKind,
    pub provider: Option<String>,
    pub purpose: PaymentPurpose,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub card_last4: Option<String>,
    pub mobile_number: Option<String>,
    pub created_at: Timestamp,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            amount: p.amount,
            method: p.method,
            provider: p.provider,
            purpose: p.purpose,
            status: p.status,
            transaction_id: p.transaction_id.as_str().to_string(),
            card_last4: p.card_last4,
            mobile_number: p.mobile_number,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSubscriptionResponse {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub phase: LifecyclePhase,
    pub days_remaining: i64,
}

impl From<CurrentSubscription> for CurrentSubscriptionResponse {
    fn from(current: CurrentSubscription) -> Self {
        Self {
            subscription: current.subscription.into(),
            phase: current.phase,
            days_remaining: current.days_remaining,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub current: Option<CurrentSubscriptionResponse>,
    pub history: Vec<SubscriptionResponse>,
}

impl From<GetSubscriptionOverviewResult> for OverviewResponse {
    fn from(result: GetSubscriptionOverviewResult) -> Self {
        Self {
            current: result.current.map(Into::into),
            history: result.history.into_iter().map(Into::into).collect(),
        }
    }
}

/// Response to subscribe and renew: the pending state plus where to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub subscription: SubscriptionResponse,
    pub payment: PaymentResponse,
    pub redirect_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_method_id: Option<PaymentMethodId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub subscription: SubscriptionResponse,
    pub active_until: NaiveDate,
}

/// Acknowledgement returned to the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

impl WebhookAck {
    pub fn processed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn not_processed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_reads_flat_payment_fields() {
        let json = r#"{
            "plan_id": "6f1c1e1a-8c1b-4c1e-9c5e-5c1b0c1e1a8c",
            "payment_method": "mobile_money",
            "mobile_number": "77 123 45 67",
            "mobile_provider": "Wave",
            "auto_renew": true
        }"#;
        let request: SubscribeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.payment_method, "mobile_money");
        assert_eq!(request.details.mobile_number.as_deref(), Some("77 123 45 67"));
        assert_eq!(request.details.mobile_provider.as_deref(), Some("Wave"));
        assert!(request.auto_renew);
        assert!(!request.save_method);
    }

    #[test]
    fn cancel_request_defaults_to_deferred() {
        let request: CancelRequest = serde_json::from_str("{}").unwrap();
        assert!(request.subscription_id.is_none());
        assert!(!request.immediate);
    }
}
