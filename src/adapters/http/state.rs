//! Shared application state for the HTTP adapters.

use std::sync::Arc;

use secrecy::SecretString;

use crate::adapters::paytech::IpnVerifier;
use crate::application::handlers::{
    AddPaymentMethodHandler, CancelSubscriptionHandler, DeletePaymentMethodHandler,
    GetPaymentSummaryHandler, GetSubscriptionOverviewHandler, HandleGatewayWebhookHandler,
    ListActiveSubscriptionsHandler, ListNotificationsHandler, ListPaymentMethodsHandler,
    ListPlansHandler, MarkNotificationReadHandler, PublishNotificationHandler,
    ReconciliationSweepHandler, RenewSubscriptionHandler, SetDefaultPaymentMethodHandler,
    SubscribeHandler,
};
use crate::domain::billing::CardTokenizer;
use crate::ports::{
    BillingReader, BillingStore, MessageSender, NotificationInbox, PaymentGateway,
    SessionValidator,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BillingStore>,
    pub reader: Arc<dyn BillingReader>,
    pub inbox: Arc<dyn NotificationInbox>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub messages: Arc<dyn MessageSender>,
    pub tokenizer: Arc<CardTokenizer>,
    pub session_validator: Arc<dyn SessionValidator>,
    pub cron_secret: Arc<SecretString>,
    /// Present when PayTech notifications must carry the hashed API keys.
    pub ipn_verifier: Option<IpnVerifier>,
    /// Currency code quoted in payment receipts.
    pub currency: Arc<str>,
}

impl AppState {
    // Subscription lifecycle

    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.reader.clone())
    }

    pub fn overview_handler(&self) -> GetSubscriptionOverviewHandler {
        GetSubscriptionOverviewHandler::new(self.reader.clone())
    }

    pub fn subscribe_handler(&self) -> SubscribeHandler {
        SubscribeHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.tokenizer.clone(),
        )
    }

    pub fn renew_handler(&self) -> RenewSubscriptionHandler {
        RenewSubscriptionHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.tokenizer.clone(),
        )
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.store.clone())
    }

    pub fn webhook_handler(&self) -> HandleGatewayWebhookHandler {
        HandleGatewayWebhookHandler::new(self.store.clone(), self.messages.clone())
            .with_currency(&*self.currency)
    }

    pub fn sweep_handler(&self) -> ReconciliationSweepHandler {
        ReconciliationSweepHandler::new(self.store.clone())
    }

    // Saved payment methods

    pub fn add_payment_method_handler(&self) -> AddPaymentMethodHandler {
        AddPaymentMethodHandler::new(self.store.clone(), self.tokenizer.clone())
    }

    pub fn list_payment_methods_handler(&self) -> ListPaymentMethodsHandler {
        ListPaymentMethodsHandler::new(self.reader.clone())
    }

    pub fn delete_payment_method_handler(&self) -> DeletePaymentMethodHandler {
        DeletePaymentMethodHandler::new(self.store.clone())
    }

    pub fn set_default_payment_method_handler(&self) -> SetDefaultPaymentMethodHandler {
        SetDefaultPaymentMethodHandler::new(self.store.clone())
    }

    // Notifications

    pub fn publish_notification_handler(&self) -> PublishNotificationHandler {
        PublishNotificationHandler::new(self.inbox.clone())
    }

    pub fn list_notifications_handler(&self) -> ListNotificationsHandler {
        ListNotificationsHandler::new(self.inbox.clone())
    }

    pub fn mark_notification_read_handler(&self) -> MarkNotificationReadHandler {
        MarkNotificationReadHandler::new(self.inbox.clone())
    }

    // Administration

    pub fn active_subscriptions_handler(&self) -> ListActiveSubscriptionsHandler {
        ListActiveSubscriptionsHandler::new(self.reader.clone())
    }

    pub fn payment_summary_handler(&self) -> GetPaymentSummaryHandler {
        GetPaymentSummaryHandler::new(self.reader.clone())
    }
}
