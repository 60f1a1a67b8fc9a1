//! Transactional store port for the subscription lifecycle.
//!
//! Every lifecycle mutation (subscribe, renew, cancel, webhook settlement,
//! sweep passes) runs inside one `BillingTransaction`. Callers normally go
//! through `application::in_transaction`, which commits on success and rolls
//! back on any error.
//!
//! # Contract
//!
//! Implementations must:
//! - Make every write invisible to other transactions until `commit`
//! - Discard every write on `rollback`, or when the transaction is dropped
//!   without being committed
//! - Provide at least read-committed isolation and lock rows returned by
//!   `find_subscription`, `find_payment` and `find_payment_by_reference`
//!   until the end of the transaction
//! - Reject a second active subscription for the same user with an
//!   `ErrorCode::Conflict` error
//! - Hold the lock taken by `lock_user` until the end of the transaction, so
//!   two units of work changing the same user's subscriptions run one after
//!   the other

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::billing::{Payment, Plan, SavedPaymentMethod, Subscription, TransactionReference};
use crate::domain::foundation::{
    DomainError, PaymentId, PaymentMethodId, PlanId, SubscriptionId, UserId,
};
use crate::domain::notification::NewNotification;

/// Opens units of work against the billing tables.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError>;
}

/// One open unit of work.
#[async_trait]
pub trait BillingTransaction: Send {
    // ── Plans ──────────────────────────────────────────────────────────

    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>, DomainError>;

    // ── Subscriptions ──────────────────────────────────────────────────

    /// Serializes lifecycle changes of one user's subscriptions. Call before
    /// looking up the active subscription.
    async fn lock_user(&mut self, user_id: UserId) -> Result<(), DomainError>;

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn find_active_subscription(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Subscription whose current period is funded by `payment_id`.
    async fn find_subscription_by_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Active subscriptions with `from <= end_date <= to`.
    async fn find_active_ending_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Subscriptions whose pending renewal was requested on or before `cutoff`.
    async fn find_renewal_holds_requested_by(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Active subscriptions with `end_date < today`.
    async fn find_active_lapsed(&mut self, today: NaiveDate)
        -> Result<Vec<Subscription>, DomainError>;

    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Returns a not-found error if the subscription does not exist.
    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError>;

    // ── Payments ───────────────────────────────────────────────────────

    async fn find_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError>;

    async fn find_payment_by_reference(
        &mut self,
        reference: &TransactionReference,
    ) -> Result<Option<Payment>, DomainError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), DomainError>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), DomainError>;

    // ── Saved payment methods ──────────────────────────────────────────

    async fn find_payment_method(
        &mut self,
        id: PaymentMethodId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError>;

    async fn find_default_payment_method(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError>;

    async fn count_payment_methods(&mut self, user_id: UserId) -> Result<u64, DomainError>;

    async fn insert_payment_method(&mut self, method: &SavedPaymentMethod)
        -> Result<(), DomainError>;

    async fn update_payment_method(&mut self, method: &SavedPaymentMethod)
        -> Result<(), DomainError>;

    /// Returns false when nothing was deleted.
    async fn delete_payment_method(&mut self, id: PaymentMethodId) -> Result<bool, DomainError>;

    /// Clears the default flag on every saved method of the user.
    async fn clear_default_payment_method(&mut self, user_id: UserId) -> Result<(), DomainError>;

    // ── Notifications ──────────────────────────────────────────────────

    /// Stores the notification and its recipient rows.
    ///
    /// Returns false, writing nothing, when the idempotency key is already
    /// taken.
    async fn publish_notification(
        &mut self,
        notification: &NewNotification,
    ) -> Result<bool, DomainError>;

    // ── Completion ─────────────────────────────────────────────────────

    async fn commit(&mut self) -> Result<(), DomainError>;

    async fn rollback(&mut self) -> Result<(), DomainError>;
}
