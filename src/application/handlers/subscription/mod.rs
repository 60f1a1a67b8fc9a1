//! Subscription lifecycle handlers.
//!
//! ## Commands
//! - Subscribing to a plan
//! - Renewing with a saved method or fresh details
//! - Cancelling now or at the end of the period
//! - Settling payments from gateway callbacks
//! - The daily reconciliation sweep
//!
//! ## Queries
//! - Plans available to a role
//! - The subscriber's overview

mod cancel;
mod checkout;
mod get_subscription_overview;
mod handle_gateway_webhook;
mod list_plans;
mod reconciliation_sweep;
mod renew;
mod subscribe;

// Commands
pub use cancel::{CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult};
pub use handle_gateway_webhook::{
    HandleGatewayWebhookCommand, HandleGatewayWebhookHandler, HandleGatewayWebhookResult,
    SettlementOutcome,
};
pub use reconciliation_sweep::{
    ReconciliationSweepCommand, ReconciliationSweepHandler, ReconciliationSweepResult,
};
pub use renew::{
    PaymentSource, RenewSubscriptionCommand, RenewSubscriptionHandler, RenewSubscriptionResult,
};
pub use subscribe::{SubscribeCommand, SubscribeHandler, SubscribeResult};

// Queries
pub use get_subscription_overview::{
    CurrentSubscription, GetSubscriptionOverviewHandler, GetSubscriptionOverviewQuery,
    GetSubscriptionOverviewResult,
};
pub use list_plans::{ListPlansHandler, ListPlansQuery, ListPlansResult};
