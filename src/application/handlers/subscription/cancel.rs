//! CancelSubscriptionHandler - Command handler for cancelling a subscription.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::application::in_transaction;
use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::{AuthenticatedUser, Role, SubscriptionId};
use crate::domain::notification::{NewNotification, SubscriptionEvent};
use crate::ports::BillingStore;

const IMMEDIATE_REASON: &str = "Cancelled at the subscriber's request";
const DEFERRED_REASON: &str = "Scheduled cancellation";

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub actor: AuthenticatedUser,
    /// Defaults to the caller's active subscription.
    pub subscription_id: Option<SubscriptionId>,
    /// Deactivate now instead of at the end of the period.
    pub immediate: bool,
    pub reason: Option<String>,
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    /// Last day of service.
    pub active_until: NaiveDate,
}

/// Handler for cancelling subscriptions.
///
/// Immediate cancellation deactivates the subscription. Deferred
/// cancellation only switches auto-renewal off and lets the period run out.
pub struct CancelSubscriptionHandler {
    store: Arc<dyn BillingStore>,
}

impl CancelSubscriptionHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        cmd.actor.require_role(Role::Driver)?;

        let reason = cmd
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| {
                let default = if cmd.immediate {
                    IMMEDIATE_REASON
                } else {
                    DEFERRED_REASON
                };
                default.to_string()
            });
        let actor = cmd.actor;
        let (subscription_id, immediate, today) = (cmd.subscription_id, cmd.immediate, cmd.today);

        let subscription = in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                // 1. Resolve the subscription, which must be active and ours
                tx.lock_user(actor.id).await?;
                let mut subscription = match subscription_id {
                    Some(id) => tx
                        .find_subscription(id)
                        .await?
                        .filter(|s| s.is_owned_by(actor.id) && s.is_active())
                        .ok_or(BillingError::SubscriptionNotFound(id))?,
                    None => tx
                        .find_active_subscription(actor.id)
                        .await?
                        .ok_or(BillingError::NoActiveSubscription)?,
                };

                // 2. Apply the cancellation
                subscription.cancel(immediate, reason)?;
                tx.update_subscription(&subscription).await?;

                // 3. Tell the subscriber which branch ran
                let event = if immediate {
                    SubscriptionEvent::CanceledImmediately
                } else {
                    SubscriptionEvent::CancellationScheduled
                };
                tx.publish_notification(&NewNotification::for_subscription(
                    event,
                    &subscription,
                    today,
                ))
                .await?;

                Ok(subscription)
            })
        })
        .await?;

        tracing::info!(
            user_id = %subscription.user_id,
            subscription_id = %subscription.id,
            immediate = immediate,
            "Subscription cancelled"
        );

        let active_until = if immediate { today } else { subscription.end_date };
        Ok(CancelSubscriptionResult {
            subscription,
            active_until,
        })
    }
}
