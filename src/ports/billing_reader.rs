//! Read-side queries over billing data.
//!
//! Queries run outside lifecycle transactions and never mutate state.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::billing::{Plan, SavedPaymentMethod, Subscription};
use crate::domain::foundation::{DomainError, Role, UserId};

/// Aggregated payment figures for an admin report window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    /// Sum of `paid` and `completed` payments created in the window.
    pub revenue: i64,
    pub settled_count: u64,
    pub pending_count: u64,
    pub pending_amount: i64,
    pub failed_count: u64,
    pub active_subscriptions: u64,
}

#[async_trait]
pub trait BillingReader: Send + Sync {
    /// Active plans for `role`, cheapest first.
    async fn list_plans(&self, role: Role) -> Result<Vec<Plan>, DomainError>;

    /// The user's active subscription, or their latest one awaiting payment.
    async fn find_current_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Most recent subscriptions first.
    async fn list_subscription_history(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Default first, then newest first.
    async fn list_payment_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SavedPaymentMethod>, DomainError>;

    /// Every active subscription, soonest end date first.
    async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>, DomainError>;

    /// Figures for payments created in `[from, to)`.
    async fn payment_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PaymentSummary, DomainError>;
}
