//! RenewSubscriptionHandler - Command handler for renewing a subscription.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::application::in_transaction;
use crate::domain::billing::{
    BillingError, CardTokenizer, Payment, PaymentChannel, PaymentInstrument, PaymentPurpose,
    RawPaymentDetails, ReferencePrefix, Subscription,
};
use crate::domain::foundation::{AuthenticatedUser, PaymentId, PaymentMethodId, Role, SubscriptionId};
use crate::domain::notification::{NewNotification, SubscriptionEvent};
use crate::ports::{BillingStore, PaymentGateway};

use super::checkout::{payment_request, record_session};

/// Where the renewal payment comes from.
#[derive(Debug, Clone)]
pub enum PaymentSource {
    /// One of the caller's saved methods.
    Saved(PaymentMethodId),
    /// Details entered for this renewal only.
    Fresh {
        channel: PaymentChannel,
        details: RawPaymentDetails,
    },
}

/// Command to renew a subscription.
#[derive(Debug, Clone)]
pub struct RenewSubscriptionCommand {
    pub actor: AuthenticatedUser,
    pub subscription_id: SubscriptionId,
    pub source: PaymentSource,
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct RenewSubscriptionResult {
    pub subscription: Subscription,
    pub payment: Payment,
    pub redirect_url: String,
}

/// Handler for renewing a subscription.
///
/// The period is extended inside the transaction that records the renewal
/// payment and stays on hold until that payment settles. A subscription
/// with a renewal on hold cannot be renewed again. If the gateway refuses
/// the payment, a compensating transaction fails it and releases the hold.
pub struct RenewSubscriptionHandler {
    store: Arc<dyn BillingStore>,
    gateway: Arc<dyn PaymentGateway>,
    tokenizer: Arc<CardTokenizer>,
}

impl RenewSubscriptionHandler {
    pub fn new(
        store: Arc<dyn BillingStore>,
        gateway: Arc<dyn PaymentGateway>,
        tokenizer: Arc<CardTokenizer>,
    ) -> Self {
        Self {
            store,
            gateway,
            tokenizer,
        }
    }

    pub async fn handle(
        &self,
        cmd: RenewSubscriptionCommand,
    ) -> Result<RenewSubscriptionResult, BillingError> {
        // 1. Only drivers renew
        cmd.actor.require_role(Role::Driver)?;

        // 2. Fresh details are validated up front
        let fresh = match &cmd.source {
            PaymentSource::Fresh { channel, details } => {
                Some(details.validate(*channel, cmd.today, &self.tokenizer)?)
            }
            PaymentSource::Saved(_) => None,
        };

        // 3. Record the payment and extend the period
        let actor = cmd.actor;
        let (subscription_id, source, today) = (cmd.subscription_id, cmd.source, cmd.today);
        let (subscription, payment, plan_name) =
            in_transaction(&*self.store, move |tx| {
                Box::pin(async move {
                    tx.lock_user(actor.id).await?;
                    let mut subscription = tx
                        .find_subscription(subscription_id)
                        .await?
                        .filter(|s| s.is_owned_by(actor.id))
                        .ok_or(BillingError::SubscriptionNotFound(subscription_id))?;
                    if subscription.renewal_hold.is_some() {
                        return Err(BillingError::conflict(
                            "A renewal payment is still pending for this subscription",
                        ));
                    }

                    let instrument: PaymentInstrument = match (fresh, source) {
                        (Some(instrument), _) => instrument,
                        (None, PaymentSource::Saved(method_id)) => {
                            let mut method = tx
                                .find_payment_method(method_id)
                                .await?
                                .filter(|m| m.is_owned_by(actor.id))
                                .ok_or(BillingError::PaymentMethodNotFound(method_id))?;
                            if method.instrument.is_expired(today) {
                                return Err(BillingError::validation("Saved card has expired"));
                            }
                            method.mark_used();
                            tx.update_payment_method(&method).await?;
                            method.instrument
                        }
                        (None, PaymentSource::Fresh { .. }) => {
                            return Err(BillingError::validation("Payment details required"));
                        }
                    };

                    let plan = tx
                        .find_plan(subscription.plan_id)
                        .await?
                        .ok_or(BillingError::PlanNotFound(subscription.plan_id))?;

                    let payment = Payment::pending(
                        actor.id,
                        plan.price,
                        PaymentPurpose::SubscriptionRenewal,
                        ReferencePrefix::Renew,
                        &instrument,
                    );
                    tx.insert_payment(&payment).await?;

                    if let Some(mut other) = tx.find_active_subscription(actor.id).await? {
                        if other.id != subscription.id {
                            other.supersede()?;
                            tx.update_subscription(&other).await?;
                        }
                    }

                    subscription.renew_pending(today, plan.duration(), payment.id)?;
                    tx.update_subscription(&subscription).await?;

                    tx.publish_notification(&NewNotification::for_subscription(
                        SubscriptionEvent::Renewed,
                        &subscription,
                        today,
                    ))
                    .await?;

                    Ok((subscription, payment, plan.name))
                })
            })
            .await?;

        tracing::info!(
            user_id = %subscription.user_id,
            subscription_id = %subscription.id,
            transaction_id = %payment.transaction_id,
            end_date = %subscription.end_date,
            "Subscription renewed, awaiting payment"
        );

        // 4. Open the hosted payment session
        let request = payment_request(&payment, &plan_name);
        match self.gateway.request_payment(&request).await {
            Ok(session) => {
                let payment = record_session(&*self.store, payment.id, session).await?;
                Ok(RenewSubscriptionResult {
                    redirect_url: payment.redirect_url.clone().unwrap_or_default(),
                    subscription,
                    payment,
                })
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    transaction_id = %payment.transaction_id,
                    error = %err,
                    "Payment gateway timed out, renewal payment left pending"
                );
                Err(err.into())
            }
            Err(err) => {
                tracing::warn!(
                    transaction_id = %payment.transaction_id,
                    error = %err,
                    "Payment gateway rejected renewal, reverting extension"
                );
                if let Err(revert_err) =
                    self.revert(subscription.id, payment.id, err.message.clone()).await
                {
                    tracing::error!(
                        transaction_id = %payment.transaction_id,
                        error = %revert_err,
                        "Failed to revert rejected renewal"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Fails the payment and releases the renewal it was meant to fund.
    async fn revert(
        &self,
        subscription_id: SubscriptionId,
        payment_id: PaymentId,
        reason: String,
    ) -> Result<(), BillingError> {
        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let Some(mut payment) = tx.find_payment(payment_id).await? else {
                    return Ok(());
                };
                payment.fail(reason)?;
                tx.update_payment(&payment).await?;

                tx.lock_user(payment.user_id).await?;
                if let Some(mut subscription) = tx.find_subscription(subscription_id).await? {
                    if subscription.release_renewal(payment_id) {
                        tx.update_subscription(&subscription).await?;
                    }
                }
                Ok(())
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::adapters::paytech::MockPaymentGateway;
    use crate::application::handlers::test_support::*;
    use crate::domain::billing::{
        PaymentStatus, Plan, SavedPaymentMethod, SubscriptionStatus,
    };
    use crate::domain::foundation::UserId;
    use crate::ports::GatewayError;

    fn user() -> UserId {
        UserId::new(42).unwrap()
    }

    fn handler(store: &InMemoryBillingStore, gateway: &MockPaymentGateway) -> RenewSubscriptionHandler {
        RenewSubscriptionHandler::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            Arc::new(tokenizer()),
        )
    }

    async fn seeded(end_date: NaiveDate) -> (InMemoryBillingStore, Plan, Subscription) {
        seeded_with(active_subscription(user(), end_date)).await
    }

    async fn seeded_with(mut sub: Subscription) -> (InMemoryBillingStore, Plan, Subscription) {
        let store = InMemoryBillingStore::new();
        let plan = monthly_driver_plan();
        store.add_plan(plan.clone()).await;
        sub.plan_id = plan.id;
        store.add_subscription(sub.clone()).await;
        (store, plan, sub)
    }

    fn fresh_wave(subscription_id: SubscriptionId) -> RenewSubscriptionCommand {
        RenewSubscriptionCommand {
            actor: driver(42),
            subscription_id,
            source: PaymentSource::Fresh {
                channel: PaymentChannel::MobileMoney,
                details: wave_details(),
            },
            today: today(),
        }
    }

    #[tokio::test]
    async fn unexpired_subscription_extends_from_end_date() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;

        let result = handler(&store, &MockPaymentGateway::new())
            .handle(fresh_wave(sub.id))
            .await
            .unwrap();

        let stored = store.subscription(sub.id).await.unwrap();
        assert_eq!(stored.end_date, date(2026, 4, 19));
        assert_eq!(stored.payment_id, Some(result.payment.id));
        assert!(result.payment.transaction_id.as_str().starts_with("RNW-"));
        assert_eq!(result.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn lapsed_subscription_restarts_from_today() {
        let mut lapsed = active_subscription(user(), date(2026, 2, 1));
        lapsed.expire().unwrap();
        let (store, _, sub) = seeded_with(lapsed).await;

        handler(&store, &MockPaymentGateway::new())
            .handle(fresh_wave(sub.id))
            .await
            .unwrap();

        let stored = store.subscription(sub.id).await.unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.end_date, date(2026, 4, 9));
    }

    #[tokio::test]
    async fn renewal_withdraws_scheduled_cancellation() {
        let mut scheduled = active_subscription(user(), date(2026, 3, 20));
        scheduled.cancel(false, "Scheduled cancellation").unwrap();
        let (store, _, sub) = seeded_with(scheduled).await;

        handler(&store, &MockPaymentGateway::new())
            .handle(fresh_wave(sub.id))
            .await
            .unwrap();

        let stored = store.subscription(sub.id).await.unwrap();
        assert!(stored.canceled_at.is_none());
        assert!(stored.cancellation_reason.is_none());
    }

    #[tokio::test]
    async fn saved_method_must_belong_to_caller() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;
        let foreign = SavedPaymentMethod::new(
            UserId::new(7).unwrap(),
            wave_details()
                .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
                .unwrap(),
            None,
            true,
        )
        .unwrap();
        store.add_payment_method(foreign.clone()).await;

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(RenewSubscriptionCommand {
                source: PaymentSource::Saved(foreign.id),
                ..fresh_wave(sub.id)
            })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::PaymentMethodNotFound(foreign.id));
        assert!(store.payments().await.is_empty());
    }

    #[tokio::test]
    async fn saved_method_funds_renewal_and_is_marked_used() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;
        let method = SavedPaymentMethod::new(
            user(),
            visa_details()
                .validate(PaymentChannel::Card, today(), &tokenizer())
                .unwrap(),
            None,
            true,
        )
        .unwrap();
        store.add_payment_method(method.clone()).await;

        let result = handler(&store, &MockPaymentGateway::new())
            .handle(RenewSubscriptionCommand {
                source: PaymentSource::Saved(method.id),
                ..fresh_wave(sub.id)
            })
            .await
            .unwrap();

        assert_eq!(result.payment.card_last4.as_deref(), Some("1111"));
        assert!(store.payment_methods().await[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn other_users_subscription_is_not_found() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(RenewSubscriptionCommand {
                actor: driver(99),
                ..fresh_wave(sub.id)
            })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::SubscriptionNotFound(sub.id));
    }

    #[tokio::test]
    async fn pending_subscription_cannot_be_renewed() {
        let (store, plan, _) = seeded(date(2026, 3, 20)).await;
        let pending = Subscription::pending(
            UserId::new(42).unwrap(),
            &plan,
            PaymentId::new(),
            false,
            today(),
        );
        store.add_subscription(pending.clone()).await;

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(fresh_wave(pending.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn rejected_payment_restores_previous_period() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;
        let gateway = MockPaymentGateway::new();
        gateway.fail_next(GatewayError::rejected("card declined"));

        let err = handler(&store, &gateway)
            .handle(fresh_wave(sub.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::GatewayRejected(_)));
        let stored = store.subscription(sub.id).await.unwrap();
        assert_eq!(stored.end_date, sub.end_date);
        assert_eq!(stored.payment_id, sub.payment_id);
        assert!(stored.renewal_hold.is_none());
        assert_eq!(store.payments().await[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn second_renewal_is_refused_while_first_is_unpaid() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;
        let gateway = MockPaymentGateway::new();
        let handler = handler(&store, &gateway);
        handler.handle(fresh_wave(sub.id)).await.unwrap();

        let err = handler.handle(fresh_wave(sub.id)).await.unwrap_err();

        assert!(matches!(err, BillingError::Conflict(_)));
        assert_eq!(
            store.subscription(sub.id).await.unwrap().end_date,
            date(2026, 4, 19)
        );
        assert_eq!(store.payments().await.len(), 1);
        assert_eq!(gateway.request_count(), 1);
    }

    #[tokio::test]
    async fn renewal_is_held_until_payment_settles() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;

        let result = handler(&store, &MockPaymentGateway::new())
            .handle(fresh_wave(sub.id))
            .await
            .unwrap();

        let hold = store
            .subscription(sub.id)
            .await
            .unwrap()
            .renewal_hold
            .unwrap();
        assert_eq!(hold.payment_id, result.payment.id);
        assert_eq!(hold.previous_end_date, date(2026, 3, 20));
        assert_eq!(store.locked_users(), vec![user()]);
    }

    #[tokio::test]
    async fn timed_out_payment_keeps_extension() {
        let (store, _, sub) = seeded(date(2026, 3, 20)).await;
        let gateway = MockPaymentGateway::new();
        gateway.fail_next(GatewayError::timeout("no answer"));

        let err = handler(&store, &gateway)
            .handle(fresh_wave(sub.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::GatewayTimeout(_)));
        assert_eq!(
            store.subscription(sub.id).await.unwrap().end_date,
            date(2026, 4, 19)
        );
        assert_eq!(store.payments().await[0].status, PaymentStatus::Pending);
    }
}
