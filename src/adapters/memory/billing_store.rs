//! In-memory implementation of the billing ports.
//!
//! Transactions take an exclusive lock on the whole state and work on a copy,
//! so they behave as serializable: commit publishes the copy, rollback (or
//! dropping the transaction) discards it. The same uniqueness rules as the
//! Postgres schema are enforced on write. `lock_user` is therefore a no-op
//! beyond recording which users were locked.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::billing::{
    Payment, PaymentStatus, Plan, SavedPaymentMethod, Subscription, TransactionReference,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, NotificationId, PaymentId, PaymentMethodId, PlanId, Role,
    SubscriptionId, Timestamp, UserId,
};
use crate::domain::notification::{Audience, Inbox, InboxEntry, NewNotification};
use crate::ports::{
    BillingReader, BillingStore, BillingTransaction, NotificationInbox, PaymentSummary,
};

/// Operation that should fail once, for rollback tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    InsertSubscription,
    InsertPayment,
    UpdateSubscription,
    PublishNotification,
    Commit,
}

/// A published notification as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNotification {
    pub notification: NewNotification,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
struct RecipientRow {
    notification_id: NotificationId,
    /// `None` marks a broadcast row.
    recipient_id: Option<UserId>,
    read: bool,
    read_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default)]
struct BillingState {
    plans: Vec<Plan>,
    subscriptions: Vec<Subscription>,
    payments: Vec<Payment>,
    methods: Vec<SavedPaymentMethod>,
    notifications: Vec<StoredNotification>,
    recipients: Vec<RecipientRow>,
}

impl BillingState {
    fn check_single_active(&self, candidate: &Subscription) -> Result<(), DomainError> {
        if !candidate.is_active() {
            return Ok(());
        }
        let clash = self
            .subscriptions
            .iter()
            .any(|s| s.id != candidate.id && s.user_id == candidate.user_id && s.is_active());
        if clash {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} already has an active subscription", candidate.user_id),
            ));
        }
        Ok(())
    }

    fn check_single_default(&self, candidate: &SavedPaymentMethod) -> Result<(), DomainError> {
        if !candidate.is_default {
            return Ok(());
        }
        let clash = self.methods.iter().any(|m| {
            m.id != candidate.id && m.user_id == candidate.user_id && m.is_default
        });
        if clash {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} already has a default payment method", candidate.user_id),
            ));
        }
        Ok(())
    }

    fn publish(&mut self, notification: &NewNotification) -> bool {
        if let Some(key) = &notification.idempotency_key {
            let taken = self
                .notifications
                .iter()
                .any(|n| n.notification.idempotency_key.as_ref() == Some(key));
            if taken {
                return false;
            }
        }
        self.notifications.push(StoredNotification {
            notification: notification.clone(),
            created_at: Timestamp::now(),
        });
        match &notification.audience {
            Audience::Broadcast => self.recipients.push(RecipientRow {
                notification_id: notification.id,
                recipient_id: None,
                read: false,
                read_at: None,
            }),
            Audience::Users(users) => {
                let unique: HashSet<_> = users.iter().copied().collect();
                for user in unique {
                    self.recipients.push(RecipientRow {
                        notification_id: notification.id,
                        recipient_id: Some(user),
                        read: false,
                        read_at: None,
                    });
                }
            }
        }
        true
    }
}

/// Billing store, reader and inbox backed by process memory.
#[derive(Clone, Default)]
pub struct InMemoryBillingStore {
    state: Arc<AsyncMutex<BillingState>>,
    fail_next: Arc<Mutex<Option<FailPoint>>>,
    user_locks: Arc<Mutex<Vec<UserId>>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call at `point` fail with a database error.
    pub fn fail_next(&self, point: FailPoint) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }

    pub async fn add_plan(&self, plan: Plan) {
        self.state.lock().await.plans.push(plan);
    }

    pub async fn add_subscription(&self, subscription: Subscription) {
        self.state.lock().await.subscriptions.push(subscription);
    }

    pub async fn add_payment(&self, payment: Payment) {
        self.state.lock().await.payments.push(payment);
    }

    pub async fn add_payment_method(&self, method: SavedPaymentMethod) {
        self.state.lock().await.methods.push(method);
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.state.lock().await.subscriptions.clone()
    }

    pub async fn subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.state
            .lock()
            .await
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.clone()
    }

    pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.state
            .lock()
            .await
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn payment_methods(&self) -> Vec<SavedPaymentMethod> {
        self.state.lock().await.methods.clone()
    }

    pub async fn notifications(&self) -> Vec<StoredNotification> {
        self.state.lock().await.notifications.clone()
    }

    /// Users passed to `lock_user`, in call order.
    pub fn locked_users(&self) -> Vec<UserId> {
        self.user_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stored notifications of one type.
    pub async fn notifications_of_kind(&self, kind: &str) -> Vec<StoredNotification> {
        self.notifications()
            .await
            .into_iter()
            .filter(|n| n.notification.kind == kind)
            .collect()
    }

    fn trip(fail_next: &Mutex<Option<FailPoint>>, point: FailPoint) -> Result<(), DomainError> {
        let mut guard = fail_next.lock().unwrap_or_else(|e| e.into_inner());
        if *guard == Some(point) {
            *guard = None;
            return Err(DomainError::database(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError> {
        Self::trip(&self.fail_next, FailPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            working,
            fail_next: self.fail_next.clone(),
            user_locks: self.user_locks.clone(),
        }))
    }
}

struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<BillingState>>,
    working: BillingState,
    fail_next: Arc<Mutex<Option<FailPoint>>>,
    user_locks: Arc<Mutex<Vec<UserId>>>,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.guard.is_none() {
            return Err(DomainError::database("transaction already finished"));
        }
        Ok(())
    }

    fn trip(&self, point: FailPoint) -> Result<(), DomainError> {
        InMemoryBillingStore::trip(&self.fail_next, point)
    }
}

#[async_trait]
impl BillingTransaction for InMemoryTransaction {
    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        self.ensure_open()?;
        Ok(self.working.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn lock_user(&mut self, user_id: UserId) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.user_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(user_id);
        Ok(())
    }

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self.working.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_active_subscription(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id && s.is_active())
            .cloned())
    }

    async fn find_subscription_by_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .subscriptions
            .iter()
            .find(|s| s.payment_id == Some(payment_id))
            .cloned())
    }

    async fn find_active_ending_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .subscriptions
            .iter()
            .filter(|s| s.is_active() && s.end_date >= from && s.end_date <= to)
            .cloned()
            .collect())
    }

    async fn find_renewal_holds_requested_by(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .subscriptions
            .iter()
            .filter(|s| {
                s.renewal_hold
                    .as_ref()
                    .is_some_and(|hold| hold.requested_on <= cutoff)
            })
            .cloned()
            .collect())
    }

    async fn find_active_lapsed(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .subscriptions
            .iter()
            .filter(|s| s.is_active() && s.end_date < today)
            .cloned()
            .collect())
    }

    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.trip(FailPoint::InsertSubscription)?;
        self.working.check_single_active(subscription)?;
        self.working.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.trip(FailPoint::UpdateSubscription)?;
        self.working.check_single_active(subscription)?;
        let slot = self
            .working
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription.id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription not found: {}", subscription.id),
                )
            })?;
        *slot = subscription.clone();
        Ok(())
    }

    async fn find_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        self.ensure_open()?;
        Ok(self.working.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn find_payment_by_reference(
        &mut self,
        reference: &TransactionReference,
    ) -> Result<Option<Payment>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| &p.transaction_id == reference)
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.trip(FailPoint::InsertPayment)?;
        if self
            .working
            .payments
            .iter()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("Duplicate transaction id {}", payment.transaction_id),
            ));
        }
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        self.ensure_open()?;
        let slot = self
            .working
            .payments
            .iter_mut()
            .find(|p| p.id == payment.id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("Payment not found: {}", payment.id),
                )
            })?;
        *slot = payment.clone();
        Ok(())
    }

    async fn find_payment_method(
        &mut self,
        id: PaymentMethodId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError> {
        self.ensure_open()?;
        Ok(self.working.methods.iter().find(|m| m.id == id).cloned())
    }

    async fn find_default_payment_method(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError> {
        self.ensure_open()?;
        Ok(self
            .working
            .methods
            .iter()
            .find(|m| m.user_id == user_id && m.is_default)
            .cloned())
    }

    async fn count_payment_methods(&mut self, user_id: UserId) -> Result<u64, DomainError> {
        self.ensure_open()?;
        Ok(self.working.methods.iter().filter(|m| m.user_id == user_id).count() as u64)
    }

    async fn insert_payment_method(
        &mut self,
        method: &SavedPaymentMethod,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.working.check_single_default(method)?;
        self.working.methods.push(method.clone());
        Ok(())
    }

    async fn update_payment_method(
        &mut self,
        method: &SavedPaymentMethod,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.working.check_single_default(method)?;
        let slot = self
            .working
            .methods
            .iter_mut()
            .find(|m| m.id == method.id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PaymentMethodNotFound,
                    format!("Payment method not found: {}", method.id),
                )
            })?;
        *slot = method.clone();
        Ok(())
    }

    async fn delete_payment_method(&mut self, id: PaymentMethodId) -> Result<bool, DomainError> {
        self.ensure_open()?;
        let before = self.working.methods.len();
        self.working.methods.retain(|m| m.id != id);
        Ok(self.working.methods.len() < before)
    }

    async fn clear_default_payment_method(&mut self, user_id: UserId) -> Result<(), DomainError> {
        self.ensure_open()?;
        for method in self.working.methods.iter_mut().filter(|m| m.user_id == user_id) {
            method.is_default = false;
        }
        Ok(())
    }

    async fn publish_notification(
        &mut self,
        notification: &NewNotification,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        self.trip(FailPoint::PublishNotification)?;
        Ok(self.working.publish(notification))
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        self.trip(FailPoint::Commit)?;
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| DomainError::database("transaction already finished"))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        self.guard.take();
        self.working = BillingState::default();
        Ok(())
    }
}

#[async_trait]
impl BillingReader for InMemoryBillingStore {
    async fn list_plans(&self, role: Role) -> Result<Vec<Plan>, DomainError> {
        let state = self.state.lock().await;
        let mut plans: Vec<_> = state
            .plans
            .iter()
            .filter(|p| p.is_available_to(role))
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.price);
        Ok(plans)
    }

    async fn find_current_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.lock().await;
        let mine = state.subscriptions.iter().filter(|s| s.user_id == user_id);
        if let Some(active) = mine.clone().find(|s| s.is_active()) {
            return Ok(Some(active.clone()));
        }
        Ok(mine
            .filter(|s| s.status == crate::domain::billing::SubscriptionStatus::PendingPayment)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list_subscription_history(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state.lock().await;
        let mut history: Vec<_> = state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(limit as usize);
        Ok(history)
    }

    async fn list_payment_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SavedPaymentMethod>, DomainError> {
        let state = self.state.lock().await;
        let mut methods: Vec<_> = state
            .methods
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        methods.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(methods)
    }

    async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state.lock().await;
        let mut active: Vec<_> = state
            .subscriptions
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|s| s.end_date);
        Ok(active)
    }

    async fn payment_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PaymentSummary, DomainError> {
        let state = self.state.lock().await;
        let mut summary = PaymentSummary::default();
        for payment in state.payments.iter().filter(|p| {
            let day = p.created_at.date();
            day >= from && day < to
        }) {
            match payment.status {
                PaymentStatus::Paid | PaymentStatus::Completed => {
                    summary.revenue += payment.amount;
                    summary.settled_count += 1;
                }
                PaymentStatus::Pending => {
                    summary.pending_count += 1;
                    summary.pending_amount += payment.amount;
                }
                PaymentStatus::Failed => summary.failed_count += 1,
                PaymentStatus::Cancelled => {}
            }
        }
        summary.active_subscriptions =
            state.subscriptions.iter().filter(|s| s.is_active()).count() as u64;
        Ok(summary)
    }
}

#[async_trait]
impl NotificationInbox for InMemoryBillingStore {
    async fn publish(&self, notification: &NewNotification) -> Result<bool, DomainError> {
        Ok(self.state.lock().await.publish(notification))
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Inbox, DomainError> {
        let state = self.state.lock().await;
        let mut entries: Vec<InboxEntry> = Vec::new();
        for stored in &state.notifications {
            let id = stored.notification.id;
            let rows: Vec<_> = state
                .recipients
                .iter()
                .filter(|r| r.notification_id == id)
                .collect();
            let personal = rows.iter().find(|r| r.recipient_id == Some(user_id));
            let broadcast = rows.iter().any(|r| r.recipient_id.is_none());
            if personal.is_none() && !broadcast {
                continue;
            }
            entries.push(InboxEntry {
                id,
                label: stored.notification.label.clone(),
                kind: stored.notification.kind.clone(),
                description: stored.notification.description.clone(),
                emitter_id: stored.notification.emitter_id,
                broadcast,
                read: personal.map(|r| r.read).unwrap_or(false),
                read_at: personal.and_then(|r| r.read_at),
                created_at: stored.created_at,
            });
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = entries.len() as u64;
        let unread = entries.iter().filter(|e| !e.read).count() as u64;
        let entries = entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Inbox {
            entries,
            total,
            unread,
        })
    }

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        let now = Timestamp::now();
        if let Some(row) = state
            .recipients
            .iter_mut()
            .find(|r| r.notification_id == id && r.recipient_id == Some(user_id))
        {
            if !row.read {
                row.read = true;
                row.read_at = Some(now);
            }
            return Ok(true);
        }
        let is_broadcast = state
            .recipients
            .iter()
            .any(|r| r.notification_id == id && r.recipient_id.is_none());
        if !is_broadcast {
            return Ok(false);
        }
        state.recipients.push(RecipientRow {
            notification_id: id,
            recipient_id: Some(user_id),
            read: true,
            read_at: Some(now),
        });
        Ok(true)
    }
}
