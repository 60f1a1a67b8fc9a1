//! SubscribeHandler - Command handler for starting a subscription.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::application::in_transaction;
use crate::domain::billing::{
    BillingError, CardTokenizer, Payment, PaymentChannel, PaymentPurpose, RawPaymentDetails,
    ReferencePrefix, SavedPaymentMethod, Subscription,
};
use crate::domain::foundation::{AuthenticatedUser, PaymentMethodId, PlanId, Role};
use crate::domain::notification::{NewNotification, SubscriptionEvent};
use crate::ports::{BillingStore, PaymentGateway};

use super::checkout::{fail_payment, payment_request, record_session};

/// Command to subscribe the caller to a plan.
#[derive(Debug, Clone)]
pub struct SubscribeCommand {
    pub actor: AuthenticatedUser,
    pub plan_id: PlanId,
    pub payment_method: PaymentChannel,
    pub details: RawPaymentDetails,
    pub auto_renew: bool,
    /// Keep the instrument as the caller's default saved method.
    pub save_method: bool,
    pub today: NaiveDate,
}

/// Result of a subscription request.
///
/// The subscription stays `pending_payment` until the gateway confirms the
/// payment through the webhook.
#[derive(Debug, Clone)]
pub struct SubscribeResult {
    pub subscription: Subscription,
    pub payment: Payment,
    pub redirect_url: String,
    pub saved_method_id: Option<PaymentMethodId>,
}

/// Handler for subscribing to a plan.
///
/// Supersedes the caller's active subscription, records a pending payment and
/// a pending subscription in one transaction, then asks the gateway for a
/// hosted payment session.
pub struct SubscribeHandler {
    store: Arc<dyn BillingStore>,
    gateway: Arc<dyn PaymentGateway>,
    tokenizer: Arc<CardTokenizer>,
}

impl SubscribeHandler {
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

    pub async fn handle(&self, cmd: SubscribeCommand) -> Result<SubscribeResult, BillingError> {
        // 1. Only drivers subscribe
        cmd.actor.require_role(Role::Driver)?;

        // 2. Validate payment details before touching the store
        let instrument = cmd
            .details
            .validate(cmd.payment_method, cmd.today, &self.tokenizer)?;

        // 3. Write payment, subscription and optional saved method atomically
        let actor = cmd.actor;
        let (plan_id, auto_renew, save_method, today) =
            (cmd.plan_id, cmd.auto_renew, cmd.save_method, cmd.today);
        let (subscription, payment, plan_name, saved_method_id) =
            in_transaction(&*self.store, move |tx| {
                Box::pin(async move {
                    let plan = tx
                        .find_plan(plan_id)
                        .await?
                        .filter(|p| p.is_available_to(actor.role))
                        .ok_or(BillingError::PlanNotFound(plan_id))?;

                    if let Some(mut current) = tx.find_active_subscription(actor.id).await? {
                        current.supersede()?;
                        tx.update_subscription(&current).await?;
                        tracing::info!(
                            user_id = %actor.id,
                            subscription_id = %current.id,
                            "Superseded active subscription"
                        );
                    }

                    let payment = Payment::pending(
                        actor.id,
                        plan.price,
                        PaymentPurpose::Subscription,
                        ReferencePrefix::Subscribe,
                        &instrument,
                    );
                    tx.insert_payment(&payment).await?;

                    let subscription =
                        Subscription::pending(actor.id, &plan, payment.id, auto_renew, today);
                    tx.insert_subscription(&subscription).await?;

                    let saved_method_id = if save_method {
                        let method = SavedPaymentMethod::new(actor.id, instrument, None, true)?;
                        tx.clear_default_payment_method(actor.id).await?;
                        tx.insert_payment_method(&method).await?;
                        Some(method.id)
                    } else {
                        None
                    };

                    tx.publish_notification(&NewNotification::for_subscription(
                        SubscriptionEvent::Pending,
                        &subscription,
                        today,
                    ))
                    .await?;

                    Ok((subscription, payment, plan.name, saved_method_id))
                })
            })
            .await?;

        tracing::info!(
            user_id = %subscription.user_id,
            subscription_id = %subscription.id,
            transaction_id = %payment.transaction_id,
            "Subscription created, awaiting payment"
        );

        // 4. Open the hosted payment session
        let request = payment_request(&payment, &plan_name);
        match self.gateway.request_payment(&request).await {
            Ok(session) => {
                let payment = record_session(&*self.store, payment.id, session).await?;
                Ok(SubscribeResult {
                    redirect_url: payment.redirect_url.clone().unwrap_or_default(),
                    subscription,
                    payment,
                    saved_method_id,
                })
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    transaction_id = %payment.transaction_id,
                    error = %err,
                    "Payment gateway timed out, payment left pending"
                );
                Err(err.into())
            }
            Err(err) => {
                tracing::warn!(
                    transaction_id = %payment.transaction_id,
                    error = %err,
                    "Payment gateway rejected subscription payment"
                );
                fail_payment(&*self.store, payment.id, err.message.clone()).await?;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FailPoint, InMemoryBillingStore};
    use crate::adapters::paytech::MockPaymentGateway;
    use crate::application::handlers::test_support::*;
    use crate::domain::billing::{PaymentStatus, Plan, SubscriptionStatus};
    use crate::domain::foundation::UserId;
    use crate::ports::GatewayError;

    fn handler(store: &InMemoryBillingStore, gateway: &MockPaymentGateway) -> SubscribeHandler {
        SubscribeHandler::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            Arc::new(tokenizer()),
        )
    }

    fn wave_command(plan_id: PlanId) -> SubscribeCommand {
        SubscribeCommand {
            actor: driver(42),
            plan_id,
            payment_method: PaymentChannel::MobileMoney,
            details: wave_details(),
            auto_renew: false,
            save_method: false,
            today: today(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn wave_subscription_creates_pending_payment_and_subscription() {
        let (store, plan) = store_with_plan().await;
        let gateway = MockPaymentGateway::new();

        let result = handler(&store, &gateway)
            .handle(wave_command(plan.id))
            .await
            .unwrap();

        let sub = store.subscription(result.subscription.id).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);
        assert_eq!(sub.start_date, today());
        assert_eq!(sub.end_date, date(2026, 4, 9));
        assert_eq!(sub.price, 5000);

        let payment = store.payment(result.payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 5000);
        assert_eq!(payment.provider.as_deref(), Some("Wave"));
        assert!(payment.transaction_id.as_str().starts_with("SUB-"));
        assert_eq!(payment.redirect_url.as_deref(), Some(result.redirect_url.as_str()));
        assert!(payment.gateway_token.is_some());
    }

    #[tokio::test]
    async fn gateway_receives_reference_and_amount() {
        let (store, plan) = store_with_plan().await;
        let gateway = MockPaymentGateway::new();

        let result = handler(&store, &gateway)
            .handle(wave_command(plan.id))
            .await
            .unwrap();

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reference, result.payment.transaction_id);
        assert_eq!(requests[0].amount, 5000);
        assert_eq!(requests[0].phone.as_deref(), Some("771234567"));
    }

    #[tokio::test]
    async fn subscriber_is_notified() {
        let (store, plan) = store_with_plan().await;
        handler(&store, &MockPaymentGateway::new())
            .handle(wave_command(plan.id))
            .await
            .unwrap();

        assert_eq!(store.notifications_of_kind("subscription_pending").await.len(), 1);
    }

    #[tokio::test]
    async fn existing_active_subscription_is_superseded() {
        let (store, plan) = store_with_plan().await;
        let previous = active_subscription(UserId::new(42).unwrap(), date(2026, 3, 20));
        store.add_subscription(previous.clone()).await;

        handler(&store, &MockPaymentGateway::new())
            .handle(wave_command(plan.id))
            .await
            .unwrap();

        let previous = store.subscription(previous.id).await.unwrap();
        assert_eq!(previous.status, SubscriptionStatus::Superseded);
        assert!(store.subscriptions().await.iter().all(|s| !s.is_active()));
    }

    #[tokio::test]
    async fn save_method_stores_default_card_without_pan() {
        let (store, plan) = store_with_plan().await;
        let cmd = SubscribeCommand {
            payment_method: PaymentChannel::Card,
            details: visa_details(),
            save_method: true,
            ..wave_command(plan.id)
        };

        let result = handler(&store, &MockPaymentGateway::new())
            .handle(cmd)
            .await
            .unwrap();

        let methods = store.payment_methods().await;
        assert_eq!(methods.len(), 1);
        assert_eq!(Some(methods[0].id), result.saved_method_id);
        assert!(methods[0].is_default);
        assert_eq!(methods[0].nickname, "Visa ****1111");
        let payment = store.payment(result.payment.id).await.unwrap();
        assert_eq!(payment.card_last4.as_deref(), Some("1111"));
        assert!(payment.card_token.as_deref().unwrap().starts_with("tok_"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Validation and authorization
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn short_card_number_is_rejected_without_writes() {
        let (store, plan) = store_with_plan().await;
        let gateway = MockPaymentGateway::new();
        let mut details = visa_details();
        details.card_number = Some("4111111111".to_string());
        let cmd = SubscribeCommand {
            payment_method: PaymentChannel::Card,
            details,
            ..wave_command(plan.id)
        };

        let err = handler(&store, &gateway).handle(cmd).await.unwrap_err();

        assert!(matches!(err, BillingError::Validation { .. }));
        assert!(store.payments().await.is_empty());
        assert!(store.subscriptions().await.is_empty());
        assert_eq!(gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_listed() {
        let (store, plan) = store_with_plan().await;
        let cmd = SubscribeCommand {
            details: RawPaymentDetails::default(),
            ..wave_command(plan.id)
        };

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(cmd)
            .await
            .unwrap_err();

        assert_eq!(
            err.missing_fields(),
            &["mobile_number".to_string(), "mobile_provider".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_plan_is_not_found() {
        let (store, _) = store_with_plan().await;
        let missing = PlanId::new();

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(wave_command(missing))
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::PlanNotFound(missing));
    }

    #[tokio::test]
    async fn inactive_plan_is_not_found() {
        let store = InMemoryBillingStore::new();
        let plan = Plan {
            active: false,
            ..monthly_driver_plan()
        };
        store.add_plan(plan.clone()).await;

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(wave_command(plan.id))
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::PlanNotFound(plan.id));
    }

    #[tokio::test]
    async fn parents_cannot_subscribe() {
        let (store, plan) = store_with_plan().await;
        let cmd = SubscribeCommand {
            actor: parent(9),
            ..wave_command(plan.id)
        };

        let err = handler(&store, &MockPaymentGateway::new())
            .handle(cmd)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Forbidden(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Atomicity and gateway failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failure_mid_transaction_rolls_everything_back() {
        let (store, plan) = store_with_plan().await;
        let previous = active_subscription(UserId::new(42).unwrap(), date(2026, 3, 20));
        store.add_subscription(previous.clone()).await;
        store.fail_next(FailPoint::PublishNotification);
        let gateway = MockPaymentGateway::new();

        let err = handler(&store, &gateway)
            .handle(wave_command(plan.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Infrastructure(_)));
        assert!(store.payments().await.is_empty());
        assert_eq!(store.subscriptions().await, vec![previous]);
        assert_eq!(gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn gateway_rejection_marks_payment_failed() {
        let (store, plan) = store_with_plan().await;
        let gateway = MockPaymentGateway::new();
        gateway.fail_next(GatewayError::rejected("invalid phone"));

        let err = handler(&store, &gateway)
            .handle(wave_command(plan.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::GatewayRejected(_)));
        let payments = store.payments().await;
        assert_eq!(payments[0].status, PaymentStatus::Failed);
        assert_eq!(payments[0].failure_reason.as_deref(), Some("invalid phone"));
        assert_eq!(
            store.subscriptions().await[0].status,
            SubscriptionStatus::PendingPayment
        );
    }

    #[tokio::test]
    async fn gateway_timeout_leaves_payment_pending() {
        let (store, plan) = store_with_plan().await;
        let gateway = MockPaymentGateway::new();
        gateway.fail_next(GatewayError::timeout("30s elapsed"));

        let err = handler(&store, &gateway)
            .handle(wave_command(plan.id))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::GatewayTimeout(_)));
        assert_eq!(store.payments().await[0].status, PaymentStatus::Pending);
    }
}
