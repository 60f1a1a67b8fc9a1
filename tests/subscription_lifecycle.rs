//! Integration tests for the subscription lifecycle.
//!
//! Drives the application handlers end to end against the in-memory store,
//! the mock gateway and the recording SMS sender.
//!
//! Run with: `cargo test --test subscription_lifecycle`

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use secrecy::SecretString;

use shuttle_subscriptions::adapters::memory::InMemoryBillingStore;
use shuttle_subscriptions::adapters::paytech::MockPaymentGateway;
use shuttle_subscriptions::adapters::sms::RecordingMessageSender;
use shuttle_subscriptions::application::handlers::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, HandleGatewayWebhookCommand,
    HandleGatewayWebhookHandler, HandleGatewayWebhookResult, PaymentSource,
    ReconciliationSweepCommand, ReconciliationSweepHandler, RenewSubscriptionCommand,
    RenewSubscriptionHandler, RenewSubscriptionResult, SettlementOutcome, SubscribeCommand,
    SubscribeHandler, SubscribeResult,
};
use shuttle_subscriptions::domain::billing::{
    BillingError, CardTokenizer, PaymentChannel, PaymentStatus, Plan, RawPaymentDetails,
    Subscription, SubscriptionStatus,
};
use shuttle_subscriptions::domain::foundation::{
    AuthenticatedUser, PaymentId, PlanId, Role, SubscriptionId, UserId,
};
use shuttle_subscriptions::ports::GatewayError;

// ════════════════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════════════════

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn driver(id: i64) -> AuthenticatedUser {
    AuthenticatedUser::new(UserId::new(id).unwrap(), Role::Driver)
}

fn monthly_plan() -> Plan {
    Plan {
        id: PlanId::new(),
        name: "Mensuel".to_string(),
        description: Some("Accès illimité pendant 30 jours".to_string()),
        price: 5000,
        duration_days: 30,
        role: Role::Driver,
        features: vec!["Trajets illimités".to_string()],
        active: true,
    }
}

fn wave() -> RawPaymentDetails {
    RawPaymentDetails {
        mobile_number: Some("771234567".to_string()),
        mobile_provider: Some("Wave".to_string()),
        ..Default::default()
    }
}

fn card(number: &str) -> RawPaymentDetails {
    RawPaymentDetails {
        card_holder_name: Some("Awa Diop".to_string()),
        card_number: Some(number.to_string()),
        card_cvv: Some("123".to_string()),
        card_exp_month: Some("12".to_string()),
        card_exp_year: Some("2030".to_string()),
        ..Default::default()
    }
}

struct Harness {
    store: InMemoryBillingStore,
    gateway: MockPaymentGateway,
    messages: RecordingMessageSender,
    tokenizer: Arc<CardTokenizer>,
    plan: Plan,
}

impl Harness {
    async fn new() -> Self {
        let store = InMemoryBillingStore::new();
        let plan = monthly_plan();
        store.add_plan(plan.clone()).await;
        Self {
            store,
            gateway: MockPaymentGateway::new(),
            messages: RecordingMessageSender::new(),
            tokenizer: Arc::new(CardTokenizer::new(SecretString::new(
                "integration-card-key".to_string(),
            ))),
            plan,
        }
    }

    fn subscribe_handler(&self) -> SubscribeHandler {
        SubscribeHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.gateway.clone()),
            self.tokenizer.clone(),
        )
    }

    fn webhook_handler(&self) -> HandleGatewayWebhookHandler {
        HandleGatewayWebhookHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.messages.clone()),
        )
    }

    fn renew_handler(&self) -> RenewSubscriptionHandler {
        RenewSubscriptionHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.gateway.clone()),
            self.tokenizer.clone(),
        )
    }

    async fn subscribe(
        &self,
        actor: AuthenticatedUser,
        channel: PaymentChannel,
        details: RawPaymentDetails,
    ) -> Result<SubscribeResult, BillingError> {
        self.subscribe_handler()
            .handle(SubscribeCommand {
                actor,
                plan_id: self.plan.id,
                payment_method: channel,
                details,
                auto_renew: false,
                save_method: false,
                today: today(),
            })
            .await
    }

    async fn settle(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
    ) -> HandleGatewayWebhookResult {
        self.webhook_handler()
            .handle(HandleGatewayWebhookCommand {
                reference: reference.to_string(),
                outcome,
                today: today(),
            })
            .await
            .unwrap()
    }

    async fn renew_with_wave(
        &self,
        actor: AuthenticatedUser,
        subscription_id: SubscriptionId,
    ) -> Result<RenewSubscriptionResult, BillingError> {
        self.renew_handler()
            .handle(RenewSubscriptionCommand {
                actor,
                subscription_id,
                source: PaymentSource::Fresh {
                    channel: PaymentChannel::MobileMoney,
                    details: wave(),
                },
                today: today(),
            })
            .await
    }

    /// Seeds an active subscription that started `started_days_ago` days
    /// before `today()`.
    async fn seed_active(&self, user: AuthenticatedUser, started_days_ago: u64) -> Subscription {
        let start = today().checked_sub_days(Days::new(started_days_ago)).unwrap();
        let mut subscription =
            Subscription::pending(user.id, &self.plan, PaymentId::new(), false, start);
        subscription.activate(start, self.plan.duration()).unwrap();
        self.store.add_subscription(subscription.clone()).await;
        subscription
    }

    async fn active_for(&self, user: AuthenticatedUser) -> Vec<Subscription> {
        self.store
            .subscriptions()
            .await
            .into_iter()
            .filter(|s| s.user_id == user.id && s.status == SubscriptionStatus::Active)
            .collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscribe and settle
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn wave_subscription_activates_for_thirty_days_when_payment_completes() {
    let h = Harness::new().await;
    let user = driver(7);

    let checkout = h
        .subscribe(user, PaymentChannel::MobileMoney, wave())
        .await
        .unwrap();

    assert_eq!(checkout.subscription.status, SubscriptionStatus::PendingPayment);
    assert_eq!(checkout.payment.status, PaymentStatus::Pending);
    assert_eq!(checkout.payment.amount, 5000);
    assert_eq!(checkout.payment.provider.as_deref(), Some("Wave"));
    assert!(checkout.redirect_url.starts_with("https://"));

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, 5000);
    assert_eq!(requests[0].reference, checkout.payment.transaction_id);

    let reference = checkout.payment.transaction_id.as_str().to_string();
    let outcome = h.settle(&reference, SettlementOutcome::Completed).await;
    assert_eq!(
        outcome,
        HandleGatewayWebhookResult::PaymentCompleted {
            payment_id: checkout.payment.id,
            activated: Some(checkout.subscription.id),
            renewed: None,
        }
    );

    let subscription = h.store.subscription(checkout.subscription.id).await.unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(subscription.start_date, today());
    assert_eq!(
        subscription.end_date,
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    );

    let payment = h.store.payment(checkout.payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);

    assert_eq!(h.store.notifications_of_kind("subscription_activated").await.len(), 1);

    let sent = h.messages.wait_for(1, Duration::from_secs(1)).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].to.ends_with("771234567"));
    assert!(sent[0].body.contains(&reference));
}

#[tokio::test]
async fn repeated_completion_callback_changes_nothing() {
    let h = Harness::new().await;
    let user = driver(7);
    let checkout = h
        .subscribe(user, PaymentChannel::MobileMoney, wave())
        .await
        .unwrap();
    let reference = checkout.payment.transaction_id.as_str().to_string();

    h.settle(&reference, SettlementOutcome::Completed).await;
    let first = h.store.subscription(checkout.subscription.id).await.unwrap();

    let replay = h.settle(&reference, SettlementOutcome::Completed).await;
    assert_eq!(
        replay,
        HandleGatewayWebhookResult::AlreadyProcessed {
            status: PaymentStatus::Completed
        }
    );

    let second = h.store.subscription(checkout.subscription.id).await.unwrap();
    assert_eq!(first.end_date, second.end_date);
    assert_eq!(h.active_for(user).await.len(), 1);
    assert_eq!(h.store.notifications_of_kind("subscription_activated").await.len(), 1);
}

#[tokio::test]
async fn cancelled_callback_leaves_subscription_unfunded() {
    let h = Harness::new().await;
    let checkout = h
        .subscribe(driver(7), PaymentChannel::MobileMoney, wave())
        .await
        .unwrap();

    let outcome = h
        .settle(
            checkout.payment.transaction_id.as_str(),
            SettlementOutcome::Cancelled,
        )
        .await;
    assert_eq!(
        outcome,
        HandleGatewayWebhookResult::PaymentCancelled {
            payment_id: checkout.payment.id,
            released: None,
        }
    );

    let payment = h.store.payment(checkout.payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
    let subscription = h.store.subscription(checkout.subscription.id).await.unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::PendingPayment);
}

#[tokio::test]
async fn unknown_reference_is_acknowledged() {
    let h = Harness::new().await;
    let outcome = h.settle("SUB-0-UNKNOWN", SettlementOutcome::Completed).await;
    assert_eq!(outcome, HandleGatewayWebhookResult::UnknownReference);
}

#[tokio::test]
async fn concurrent_activations_leave_one_active_subscription() {
    let h = Harness::new().await;
    let user = driver(7);

    let first = h
        .subscribe(user, PaymentChannel::MobileMoney, wave())
        .await
        .unwrap();
    let second = h
        .subscribe(user, PaymentChannel::Card, card("4111 1111 1111 1111"))
        .await
        .unwrap();

    let first_ref = first.payment.transaction_id.as_str().to_string();
    let second_ref = second.payment.transaction_id.as_str().to_string();
    let (a, b) = tokio::join!(
        h.settle(&first_ref, SettlementOutcome::Completed),
        h.settle(&second_ref, SettlementOutcome::Completed),
    );
    assert!(matches!(a, HandleGatewayWebhookResult::PaymentCompleted { .. }));
    assert!(matches!(b, HandleGatewayWebhookResult::PaymentCompleted { .. }));

    assert_eq!(h.active_for(user).await.len(), 1);
}

#[tokio::test]
async fn subscribing_again_supersedes_the_active_subscription() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 5).await;

    let checkout = h
        .subscribe(user, PaymentChannel::MobileMoney, wave())
        .await
        .unwrap();

    let previous = h.store.subscription(current.id).await.unwrap();
    assert_eq!(previous.status, SubscriptionStatus::Superseded);
    assert_eq!(checkout.subscription.status, SubscriptionStatus::PendingPayment);
    assert!(h.active_for(user).await.is_empty());
}

// ════════════════════════════════════════════════════════════════════════════════
// Validation and gateway failures
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn short_card_number_is_rejected_without_writing() {
    let h = Harness::new().await;

    let err = h
        .subscribe(driver(7), PaymentChannel::Card, card("4111111111"))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::Validation { .. }));
    assert!(h.store.subscriptions().await.is_empty());
    assert!(h.store.payments().await.is_empty());
    assert_eq!(h.gateway.request_count(), 0);
}

#[tokio::test]
async fn missing_mobile_fields_are_listed() {
    let h = Harness::new().await;

    let err = h
        .subscribe(
            driver(7),
            PaymentChannel::MobileMoney,
            RawPaymentDetails::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.missing_fields(), &["mobile_number", "mobile_provider"]);
}

#[tokio::test]
async fn gateway_rejection_marks_payment_failed() {
    let h = Harness::new().await;
    h.gateway.fail_next(GatewayError::rejected("insufficient funds"));

    let err = h
        .subscribe(driver(7), PaymentChannel::MobileMoney, wave())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::GatewayRejected(_)));

    let payments = h.store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert!(h.active_for(driver(7)).await.is_empty());
}

#[tokio::test]
async fn gateway_timeout_keeps_payment_pending() {
    let h = Harness::new().await;
    h.gateway.fail_next(GatewayError::timeout("no answer"));

    let err = h
        .subscribe(driver(7), PaymentChannel::MobileMoney, wave())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::GatewayTimeout(_)));

    let payments = h.store.payments().await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
}

// ════════════════════════════════════════════════════════════════════════════════
// Renewal
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn renewal_extends_an_unexpired_period() {
    let h = Harness::new().await;
    let user = driver(7);
    // Started 20 days ago, 10 days left.
    let current = h.seed_active(user, 20).await;

    let renewed = h
        .renew_handler()
        .handle(RenewSubscriptionCommand {
            actor: user,
            subscription_id: current.id,
            source: PaymentSource::Fresh {
                channel: PaymentChannel::MobileMoney,
                details: wave(),
            },
            today: today(),
        })
        .await
        .unwrap();

    assert_eq!(
        renewed.subscription.end_date,
        current.end_date.checked_add_days(Days::new(30)).unwrap()
    );
    assert_eq!(renewed.payment.amount, 5000);
    assert_eq!(h.store.notifications_of_kind("subscription_renewed").await.len(), 1);
}

#[tokio::test]
async fn renewal_of_a_lapsed_period_restarts_today() {
    let h = Harness::new().await;
    let user = driver(7);
    // Ended 10 days ago.
    let current = h.seed_active(user, 40).await;

    let renewed = h
        .renew_handler()
        .handle(RenewSubscriptionCommand {
            actor: user,
            subscription_id: current.id,
            source: PaymentSource::Fresh {
                channel: PaymentChannel::MobileMoney,
                details: wave(),
            },
            today: today(),
        })
        .await
        .unwrap();

    assert_eq!(
        renewed.subscription.end_date,
        today().checked_add_days(Days::new(30)).unwrap()
    );
}

#[tokio::test]
async fn rejected_renewal_restores_the_previous_period() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 20).await;
    h.gateway.fail_next(GatewayError::rejected("card declined"));

    let err = h
        .renew_handler()
        .handle(RenewSubscriptionCommand {
            actor: user,
            subscription_id: current.id,
            source: PaymentSource::Fresh {
                channel: PaymentChannel::Card,
                details: card("4111 1111 1111 1111"),
            },
            today: today(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::GatewayRejected(_)));

    let stored = h.store.subscription(current.id).await.unwrap();
    assert_eq!(stored.end_date, current.end_date);
    assert_eq!(stored.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn cancelled_renewal_payment_gives_back_no_free_period() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 20).await;

    let renewed = h.renew_with_wave(user, current.id).await.unwrap();
    assert!(renewed.subscription.end_date > current.end_date);

    let outcome = h
        .settle(
            renewed.payment.transaction_id.as_str(),
            SettlementOutcome::Cancelled,
        )
        .await;
    assert_eq!(
        outcome,
        HandleGatewayWebhookResult::PaymentCancelled {
            payment_id: renewed.payment.id,
            released: Some(current.id),
        }
    );

    let stored = h.store.subscription(current.id).await.unwrap();
    assert_eq!(stored.end_date, current.end_date);
    assert_eq!(stored.payment_id, current.payment_id);
    assert!(stored.renewal_hold.is_none());
    assert_eq!(
        h.store
            .notifications_of_kind("subscription_renewal_reverted")
            .await
            .len(),
        1
    );

    // The next checkout starts from the restored end date, not the abandoned one.
    let again = h.renew_with_wave(user, current.id).await.unwrap();
    assert_eq!(
        again.subscription.end_date,
        current.end_date.checked_add_days(Days::new(30)).unwrap()
    );
}

#[tokio::test]
async fn repeated_renewals_wait_for_the_pending_payment() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 20).await;

    let first = h.renew_with_wave(user, current.id).await.unwrap();
    let err = h.renew_with_wave(user, current.id).await.unwrap_err();
    assert!(matches!(err, BillingError::Conflict(_)));
    assert_eq!(h.gateway.requests().len(), 1);

    let stored = h.store.subscription(current.id).await.unwrap();
    assert_eq!(stored.end_date, first.subscription.end_date);

    h.settle(
        first.payment.transaction_id.as_str(),
        SettlementOutcome::Completed,
    )
    .await;
    let second = h.renew_with_wave(user, current.id).await.unwrap();
    assert_eq!(
        second.subscription.end_date,
        first
            .subscription
            .end_date
            .checked_add_days(Days::new(30))
            .unwrap()
    );
}

#[tokio::test]
async fn sweep_releases_an_abandoned_renewal_checkout() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 20).await;
    let renewed = h.renew_with_wave(user, current.id).await.unwrap();

    let later = today().checked_add_days(Days::new(2)).unwrap();
    let result = ReconciliationSweepHandler::new(Arc::new(h.store.clone()))
        .handle(ReconciliationSweepCommand { today: later })
        .await
        .unwrap();
    assert_eq!(result.renewals_released, 1);

    let stored = h.store.subscription(current.id).await.unwrap();
    assert_eq!(stored.end_date, current.end_date);
    let payment = h.store.payment(renewed.payment.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn renewing_someone_elses_subscription_is_not_found() {
    let h = Harness::new().await;
    let current = h.seed_active(driver(7), 5).await;

    let err = h
        .renew_handler()
        .handle(RenewSubscriptionCommand {
            actor: driver(8),
            subscription_id: current.id,
            source: PaymentSource::Fresh {
                channel: PaymentChannel::MobileMoney,
                details: wave(),
            },
            today: today(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::SubscriptionNotFound(_)));
}

// ════════════════════════════════════════════════════════════════════════════════
// Cancellation
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn deferred_cancellation_keeps_service_until_end_date() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 5).await;

    let result = CancelSubscriptionHandler::new(Arc::new(h.store.clone()))
        .handle(CancelSubscriptionCommand {
            actor: user,
            subscription_id: None,
            immediate: false,
            reason: None,
            today: today(),
        })
        .await
        .unwrap();

    assert_eq!(result.subscription.status, SubscriptionStatus::Active);
    assert!(!result.subscription.auto_renew);
    assert!(result.subscription.canceled_at.is_some());
    assert_eq!(result.active_until, current.end_date);
}

#[tokio::test]
async fn immediate_cancellation_deactivates_now() {
    let h = Harness::new().await;
    let user = driver(7);
    let current = h.seed_active(user, 5).await;

    let result = CancelSubscriptionHandler::new(Arc::new(h.store.clone()))
        .handle(CancelSubscriptionCommand {
            actor: user,
            subscription_id: Some(current.id),
            immediate: true,
            reason: Some("Moving away".to_string()),
            today: today(),
        })
        .await
        .unwrap();

    assert_eq!(result.subscription.status, SubscriptionStatus::Canceled);
    assert_eq!(
        result.subscription.cancellation_reason.as_deref(),
        Some("Moving away")
    );
    assert!(h.active_for(user).await.is_empty());
}

#[tokio::test]
async fn cancelling_without_an_active_subscription_fails() {
    let h = Harness::new().await;

    let err = CancelSubscriptionHandler::new(Arc::new(h.store.clone()))
        .handle(CancelSubscriptionCommand {
            actor: driver(7),
            subscription_id: None,
            immediate: true,
            reason: None,
            today: today(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::NoActiveSubscription));
}

// ════════════════════════════════════════════════════════════════════════════════
// Reconciliation sweep
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sweep_reminds_once_per_day_and_expires_lapsed_periods() {
    let h = Harness::new().await;
    // Ends in 3 days.
    let soon = h.seed_active(driver(7), 27).await;
    // Ended yesterday.
    let lapsed = h.seed_active(driver(8), 31).await;

    let sweep = ReconciliationSweepHandler::new(Arc::new(h.store.clone()));

    let first = sweep
        .handle(ReconciliationSweepCommand { today: today() })
        .await
        .unwrap();
    assert_eq!(first.expiring_soon, 1);
    assert_eq!(first.expired, 1);

    let second = sweep
        .handle(ReconciliationSweepCommand { today: today() })
        .await
        .unwrap();
    assert_eq!(second.expiring_soon, 0);
    assert_eq!(second.expired, 0);

    assert_eq!(
        h.store
            .notifications_of_kind("subscription_expiring_soon")
            .await
            .len(),
        1
    );
    assert_eq!(
        h.store.subscription(soon.id).await.unwrap().status,
        SubscriptionStatus::Active
    );
    assert_eq!(
        h.store.subscription(lapsed.id).await.unwrap().status,
        SubscriptionStatus::Expired
    );
}

#[tokio::test]
async fn sweep_on_the_next_day_reminds_again() {
    let h = Harness::new().await;
    h.seed_active(driver(7), 27).await;
    let sweep = ReconciliationSweepHandler::new(Arc::new(h.store.clone()));

    sweep
        .handle(ReconciliationSweepCommand { today: today() })
        .await
        .unwrap();
    let next_day = sweep
        .handle(ReconciliationSweepCommand {
            today: today().succ_opt().unwrap(),
        })
        .await
        .unwrap();

    assert_eq!(next_day.expiring_soon, 1);
}
