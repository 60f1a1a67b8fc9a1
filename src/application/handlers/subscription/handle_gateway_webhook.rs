//! HandleGatewayWebhookHandler - Command handler for gateway settlement callbacks.
//!
//! Delivery is at least once. A payment that already left `pending` is never
//! touched again, so replays are acknowledged without side effects.

use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::application::in_transaction;
use crate::domain::billing::{BillingError, Payment, PaymentStatus, SubscriptionStatus, TransactionReference};
use crate::domain::foundation::{PaymentId, SubscriptionId};
use crate::domain::notification::{NewNotification, SubscriptionEvent};
use crate::ports::{BillingStore, MessageSender};

/// Settlement outcome reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Completed,
    Cancelled,
    /// Any other event; acknowledged and ignored.
    Other(String),
}

/// Command carrying an authenticated gateway callback.
#[derive(Debug, Clone)]
pub struct HandleGatewayWebhookCommand {
    /// The `ref_command` echoed back by the gateway.
    pub reference: String,
    pub outcome: SettlementOutcome,
    pub today: NaiveDate,
}

/// What the callback did. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleGatewayWebhookResult {
    PaymentCompleted {
        payment_id: PaymentId,
        /// Subscription activated by this payment, if it was awaiting one.
        activated: Option<SubscriptionId>,
        /// Subscription whose pending renewal this payment made final.
        renewed: Option<SubscriptionId>,
    },
    PaymentCancelled {
        payment_id: PaymentId,
        /// Subscription whose pending renewal was rolled back.
        released: Option<SubscriptionId>,
    },
    /// The payment already left `pending`; nothing changed.
    AlreadyProcessed {
        status: PaymentStatus,
    },
    UnknownReference,
    Ignored,
}

/// Currency quoted in receipts unless configured otherwise.
pub const DEFAULT_RECEIPT_CURRENCY: &str = "XOF";

/// Handler for payment gateway callbacks.
///
/// Completion activates the subscription the payment funds, or makes its
/// pending renewal final, and sends a receipt by SMS when the payment carries
/// a mobile number. Cancellation rolls a pending renewal back.
pub struct HandleGatewayWebhookHandler {
    store: Arc<dyn BillingStore>,
    messages: Arc<dyn MessageSender>,
    currency: String,
}

impl HandleGatewayWebhookHandler {
    pub fn new(store: Arc<dyn BillingStore>, messages: Arc<dyn MessageSender>) -> Self {
        Self {
            store,
            messages,
            currency: DEFAULT_RECEIPT_CURRENCY.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub async fn handle(
        &self,
        cmd: HandleGatewayWebhookCommand,
    ) -> Result<HandleGatewayWebhookResult, BillingError> {
        let reference = match TransactionReference::new(cmd.reference.trim()) {
            Ok(reference) => reference,
            Err(_) => {
                tracing::warn!("Gateway callback without reference");
                return Ok(HandleGatewayWebhookResult::Ignored);
            }
        };

        let outcome = cmd.outcome;
        if let SettlementOutcome::Other(event) = &outcome {
            tracing::info!(transaction_id = %reference, event = %event, "Ignoring gateway event");
            return Ok(HandleGatewayWebhookResult::Ignored);
        }

        let today = cmd.today;
        let lookup = reference.clone();
        let (result, receipt) = in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                // 1. Find the payment by its reference
                let mut payment = match tx.find_payment_by_reference(&lookup).await? {
                    Some(payment) => payment,
                    None => return Ok((HandleGatewayWebhookResult::UnknownReference, None)),
                };

                // 2. Replays and late callbacks change nothing
                if payment.status != PaymentStatus::Pending {
                    return Ok((
                        HandleGatewayWebhookResult::AlreadyProcessed {
                            status: payment.status,
                        },
                        None,
                    ));
                }

                // 3. One lifecycle change per user at a time
                tx.lock_user(payment.user_id).await?;

                if outcome == SettlementOutcome::Cancelled {
                    payment.cancel()?;
                    tx.update_payment(&payment).await?;

                    let mut released = None;
                    if let Some(mut subscription) =
                        tx.find_subscription_by_payment(payment.id).await?
                    {
                        if subscription.release_renewal(payment.id) {
                            tx.update_subscription(&subscription).await?;
                            tx.publish_notification(&NewNotification::for_subscription(
                                SubscriptionEvent::RenewalReverted,
                                &subscription,
                                today,
                            ))
                            .await?;
                            released = Some(subscription.id);
                        }
                    }
                    return Ok((
                        HandleGatewayWebhookResult::PaymentCancelled {
                            payment_id: payment.id,
                            released,
                        },
                        None,
                    ));
                }

                // 4. Settle the payment
                payment.complete()?;
                tx.update_payment(&payment).await?;

                // 5. Activate the subscription it funds, or confirm its renewal
                let mut activated = None;
                let mut renewed = None;
                if let Some(mut subscription) = tx.find_subscription_by_payment(payment.id).await? {
                    if subscription.confirm_renewal(payment.id) {
                        tx.update_subscription(&subscription).await?;
                        renewed = Some(subscription.id);
                    } else if subscription.status == SubscriptionStatus::PendingPayment {
                        if let Some(mut other) =
                            tx.find_active_subscription(subscription.user_id).await?
                        {
                            other.supersede()?;
                            tx.update_subscription(&other).await?;
                        }

                        let duration = match tx.find_plan(subscription.plan_id).await? {
                            Some(plan) => plan.duration(),
                            None => original_duration(subscription.start_date, subscription.end_date),
                        };
                        subscription.activate(today, duration)?;
                        tx.update_subscription(&subscription).await?;

                        tx.publish_notification(&NewNotification::for_subscription(
                            SubscriptionEvent::Activated,
                            &subscription,
                            today,
                        ))
                        .await?;
                        activated = Some(subscription.id);
                    }
                }

                Ok((
                    HandleGatewayWebhookResult::PaymentCompleted {
                        payment_id: payment.id,
                        activated,
                        renewed,
                    },
                    Some(payment),
                ))
            })
        })
        .await?;

        match &result {
            HandleGatewayWebhookResult::UnknownReference => {
                tracing::warn!(transaction_id = %reference, "Gateway callback for unknown payment");
            }
            HandleGatewayWebhookResult::AlreadyProcessed { status } => {
                tracing::info!(
                    transaction_id = %reference,
                    status = %status,
                    "Duplicate gateway callback acknowledged"
                );
            }
            HandleGatewayWebhookResult::PaymentCompleted {
                activated, renewed, ..
            } => {
                tracing::info!(
                    transaction_id = %reference,
                    activated = ?activated,
                    renewed = ?renewed,
                    "Payment completed"
                );
            }
            HandleGatewayWebhookResult::PaymentCancelled { released, .. } => {
                tracing::info!(
                    transaction_id = %reference,
                    released = ?released,
                    "Payment cancelled by gateway"
                );
            }
            HandleGatewayWebhookResult::Ignored => {}
        }

        // 6. Receipt, fire and forget
        if let Some(payment) = receipt {
            self.send_receipt(payment);
        }

        Ok(result)
    }

    fn send_receipt(&self, payment: Payment) {
        let Some(to) = payment.mobile_number.clone() else {
            return;
        };
        let messages = self.messages.clone();
        let body = format!(
            "Payment of {} {} received (ref {}). Thank you!",
            payment.amount, self.currency, payment.transaction_id
        );
        tokio::spawn(async move {
            if let Err(e) = messages.send(&to, &body).await {
                tracing::warn!(
                    transaction_id = %payment.transaction_id,
                    error = %e,
                    "Failed to send payment receipt"
                );
            }
        });
    }
}

fn original_duration(start: NaiveDate, end: NaiveDate) -> Days {
    Days::new((end - start).num_days().max(0) as u64)
}
