//! ReconciliationSweepHandler - Command handler for the daily subscription sweep.
//!
//! Passes run in order, each in its own transaction:
//!
//! 1. Release of renewals whose checkout was abandoned, one transaction each
//! 2. Expiring-soon reminders (end within the next seven days, no auto-renew)
//! 3. Expires-today reminders (no auto-renew)
//! 4. Expiry of lapsed subscriptions
//! 5. Automatic renewal of subscriptions ending today, one transaction each
//!
//! Reminders carry a per-day idempotency key, so running the sweep twice on
//! the same day notifies once.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::application::in_transaction;
use crate::domain::billing::{
    BillingError, Payment, PaymentStatus, Subscription, EXPIRING_SOON_WINDOW_DAYS,
    RENEWAL_HOLD_DAYS,
};
use crate::domain::foundation::{PaymentId, SubscriptionId, UserId};
use crate::domain::notification::{NewNotification, SubscriptionEvent};
use crate::ports::BillingStore;

#[derive(Debug, Clone)]
pub struct ReconciliationSweepCommand {
    pub today: NaiveDate,
}

/// Counts per pass. Reminders count only when newly published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSweepResult {
    pub renewals_released: u64,
    pub expiring_soon: u64,
    pub expiring_today: u64,
    pub expired: u64,
    pub auto_renewed: u64,
    pub auto_renew_failed: u64,
}

enum RenewalAttempt {
    Renewed,
    /// No longer due: renewed, cancelled or switched to manual meanwhile.
    Skipped,
}

pub struct ReconciliationSweepHandler {
    store: Arc<dyn BillingStore>,
}

impl ReconciliationSweepHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        cmd: ReconciliationSweepCommand,
    ) -> Result<ReconciliationSweepResult, BillingError> {
        let today = cmd.today;
        let window_end = today
            .checked_add_days(Days::new(EXPIRING_SOON_WINDOW_DAYS))
            .unwrap_or(NaiveDate::MAX);

        let mut result = ReconciliationSweepResult {
            renewals_released: self.release_abandoned_renewals(today).await?,
            expiring_soon: self
                .remind(today, today, window_end, SubscriptionEvent::ExpiringSoon)
                .await?,
            expiring_today: self
                .remind(today, today, today, SubscriptionEvent::ExpiringToday)
                .await?,
            expired: self.expire_lapsed(today).await?,
            ..Default::default()
        };

        for (subscription_id, user_id) in self.due_for_renewal(today).await? {
            match self.auto_renew(subscription_id, user_id, today).await {
                Ok(RenewalAttempt::Renewed) => result.auto_renewed += 1,
                Ok(RenewalAttempt::Skipped) => {}
                Err(err) => {
                    tracing::warn!(
                        subscription_id = %subscription_id,
                        error = %err,
                        "Automatic renewal failed"
                    );
                    result.auto_renew_failed += 1;
                    if let Err(notify_err) = self.notify_renewal_failure(subscription_id, today).await {
                        tracing::error!(
                            subscription_id = %subscription_id,
                            error = %notify_err,
                            "Failed to record automatic renewal failure"
                        );
                    }
                }
            }
        }

        tracing::info!(
            today = %today,
            renewals_released = result.renewals_released,
            expiring_soon = result.expiring_soon,
            expiring_today = result.expiring_today,
            expired = result.expired,
            auto_renewed = result.auto_renewed,
            auto_renew_failed = result.auto_renew_failed,
            "Reconciliation sweep finished"
        );

        Ok(result)
    }

    /// Undoes renewals whose payment is still open after the hold period.
    async fn release_abandoned_renewals(&self, today: NaiveDate) -> Result<u64, BillingError> {
        let cutoff = today
            .checked_sub_days(Days::new(RENEWAL_HOLD_DAYS))
            .unwrap_or(NaiveDate::MIN);
        let held: Vec<(SubscriptionId, PaymentId)> = in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                Ok(tx
                    .find_renewal_holds_requested_by(cutoff)
                    .await?
                    .into_iter()
                    .filter_map(|s| s.renewal_hold.map(|hold| (s.id, hold.payment_id)))
                    .collect())
            })
        })
        .await?;

        let mut released = 0;
        for (subscription_id, payment_id) in held {
            match self.release_abandoned(subscription_id, payment_id, today).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(
                    subscription_id = %subscription_id,
                    error = %err,
                    "Failed to release abandoned renewal"
                ),
            }
        }
        Ok(released)
    }

    async fn release_abandoned(
        &self,
        subscription_id: SubscriptionId,
        payment_id: PaymentId,
        today: NaiveDate,
    ) -> Result<bool, BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                // Payment row first, then the user: the order a callback takes
                let Some(mut payment) = tx.find_payment(payment_id).await? else {
                    return Ok(false);
                };
                match payment.status {
                    PaymentStatus::Pending => {
                        payment.fail(ABANDONED_CHECKOUT_REASON)?;
                        tx.update_payment(&payment).await?;
                    }
                    PaymentStatus::Failed | PaymentStatus::Cancelled => {}
                    PaymentStatus::Paid | PaymentStatus::Completed => {
                        tx.lock_user(payment.user_id).await?;
                        if let Some(mut subscription) = tx.find_subscription(subscription_id).await? {
                            if subscription.confirm_renewal(payment_id) {
                                tx.update_subscription(&subscription).await?;
                            }
                        }
                        return Ok(false);
                    }
                }

                tx.lock_user(payment.user_id).await?;
                let Some(mut subscription) = tx.find_subscription(subscription_id).await? else {
                    return Ok(false);
                };
                if !subscription.release_renewal(payment_id) {
                    return Ok(false);
                }
                tx.update_subscription(&subscription).await?;
                tx.publish_notification(&NewNotification::for_subscription(
                    SubscriptionEvent::RenewalReverted,
                    &subscription,
                    today,
                ))
                .await?;

                tracing::info!(
                    subscription_id = %subscription.id,
                    transaction_id = %payment.transaction_id,
                    end_date = %subscription.end_date,
                    "Abandoned renewal released"
                );
                Ok(true)
            })
        })
        .await
    }

    /// Reminds manual-renewal subscribers whose period ends in `[from, to]`.
    async fn remind(
        &self,
        today: NaiveDate,
        from: NaiveDate,
        to: NaiveDate,
        event: SubscriptionEvent,
    ) -> Result<u64, BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let mut published = 0;
                for subscription in tx.find_active_ending_between(from, to).await? {
                    if subscription.auto_renew {
                        continue;
                    }
                    let notification = NewNotification::for_subscription(event, &subscription, today)
                        .once_per_day(&subscription, today);
                    if tx.publish_notification(&notification).await? {
                        published += 1;
                    }
                }
                Ok(published)
            })
        })
        .await
    }

    async fn expire_lapsed(&self, today: NaiveDate) -> Result<u64, BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let mut expired = 0;
                for mut subscription in tx.find_active_lapsed(today).await? {
                    subscription.expire()?;
                    tx.update_subscription(&subscription).await?;
                    tx.publish_notification(
                        &NewNotification::for_subscription(
                            SubscriptionEvent::Expired,
                            &subscription,
                            today,
                        )
                        .once_per_day(&subscription, today),
                    )
                    .await?;
                    expired += 1;
                }
                Ok(expired)
            })
        })
        .await
    }

    async fn due_for_renewal(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<(SubscriptionId, UserId)>, BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let mut due = Vec::new();
                for subscription in tx.find_active_ending_between(today, today).await? {
                    if !is_due(&subscription, today) {
                        continue;
                    }
                    if tx
                        .find_default_payment_method(subscription.user_id)
                        .await?
                        .is_some()
                    {
                        due.push((subscription.id, subscription.user_id));
                    } else {
                        tracing::info!(
                            subscription_id = %subscription.id,
                            "Auto-renewal skipped, no default payment method"
                        );
                    }
                }
                Ok(due)
            })
        })
        .await
    }

    async fn auto_renew(
        &self,
        subscription_id: SubscriptionId,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<RenewalAttempt, BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                // 1. Re-check under the user lock
                tx.lock_user(user_id).await?;
                let mut subscription = match tx.find_subscription(subscription_id).await? {
                    Some(s) if is_due(&s, today) => s,
                    _ => return Ok(RenewalAttempt::Skipped),
                };
                let mut method = tx
                    .find_default_payment_method(subscription.user_id)
                    .await?
                    .ok_or_else(|| BillingError::validation("No default payment method"))?;
                if method.instrument.is_expired(today) {
                    return Err(BillingError::validation("Default card has expired"));
                }
                let plan = tx
                    .find_plan(subscription.plan_id)
                    .await?
                    .ok_or(BillingError::PlanNotFound(subscription.plan_id))?;

                // 2. Record the system payment and extend
                let payment = Payment::automatic_renewal(subscription.user_id, subscription.price);
                tx.insert_payment(&payment).await?;
                subscription.renew(today, plan.duration(), payment.id)?;
                tx.update_subscription(&subscription).await?;
                method.mark_used();
                tx.update_payment_method(&method).await?;

                // 3. Notify
                tx.publish_notification(&NewNotification::for_subscription(
                    SubscriptionEvent::AutoRenewed,
                    &subscription,
                    today,
                ))
                .await?;

                tracing::info!(
                    subscription_id = %subscription.id,
                    transaction_id = %payment.transaction_id,
                    end_date = %subscription.end_date,
                    "Subscription renewed automatically"
                );
                Ok(RenewalAttempt::Renewed)
            })
        })
        .await
    }

    async fn notify_renewal_failure(
        &self,
        subscription_id: SubscriptionId,
        today: NaiveDate,
    ) -> Result<(), BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                if let Some(subscription) = tx.find_subscription(subscription_id).await? {
                    tx.publish_notification(
                        &NewNotification::for_subscription(
                            SubscriptionEvent::AutoRenewFailed,
                            &subscription,
                            today,
                        )
                        .once_per_day(&subscription, today),
                    )
                    .await?;
                }
                Ok(())
            })
        })
        .await
    }
}

const ABANDONED_CHECKOUT_REASON: &str = "Renewal checkout abandoned";

fn is_due(subscription: &Subscription, today: NaiveDate) -> bool {
    subscription.is_active()
        && subscription.auto_renew
        && subscription.end_date == today
        && subscription.renewal_hold.is_none()
}
