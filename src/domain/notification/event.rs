//! Subscription lifecycle events that notify the subscriber.

use chrono::NaiveDate;

use crate::domain::billing::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionEvent {
    Pending,
    Activated,
    Renewed,
    CanceledImmediately,
    CancellationScheduled,
    ExpiringSoon,
    ExpiringToday,
    Expired,
    AutoRenewed,
    AutoRenewFailed,
    /// A renewal payment was cancelled or abandoned; the extension was undone.
    RenewalReverted,
}

impl SubscriptionEvent {
    /// Notification type stored with the message.
    pub fn kind(&self) -> &'static str {
        match self {
            SubscriptionEvent::Pending => "subscription_pending",
            SubscriptionEvent::Activated => "subscription_activated",
            SubscriptionEvent::Renewed => "subscription_renewed",
            SubscriptionEvent::CanceledImmediately | SubscriptionEvent::CancellationScheduled => {
                "subscription_canceled"
            }
            SubscriptionEvent::ExpiringSoon => "subscription_expiring_soon",
            SubscriptionEvent::ExpiringToday => "subscription_expiring_today",
            SubscriptionEvent::Expired => "subscription_expired",
            SubscriptionEvent::AutoRenewed => "subscription_auto_renewed",
            SubscriptionEvent::AutoRenewFailed => "subscription_auto_renew_failed",
            SubscriptionEvent::RenewalReverted => "subscription_renewal_reverted",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionEvent::Pending => "Subscription awaiting payment",
            SubscriptionEvent::Activated => "Subscription activated",
            SubscriptionEvent::Renewed => "Subscription renewed",
            SubscriptionEvent::CanceledImmediately => "Subscription cancelled",
            SubscriptionEvent::CancellationScheduled => "Subscription cancellation scheduled",
            SubscriptionEvent::ExpiringSoon => "Subscription expiring soon",
            SubscriptionEvent::ExpiringToday => "Subscription expires today",
            SubscriptionEvent::Expired => "Subscription expired",
            SubscriptionEvent::AutoRenewed => "Subscription renewed automatically",
            SubscriptionEvent::AutoRenewFailed => "Automatic renewal failed",
            SubscriptionEvent::RenewalReverted => "Renewal not paid",
        }
    }

    /// Human-readable body for `subscription` as seen on `today`.
    pub fn describe(&self, subscription: &Subscription, today: NaiveDate) -> String {
        let plan = &subscription.plan_name;
        let end = subscription.end_date.format("%d/%m/%Y");
        match self {
            SubscriptionEvent::Pending => format!(
                "Your {} subscription will start as soon as the payment of {} XOF is confirmed.",
                plan, subscription.price
            ),
            SubscriptionEvent::Activated => {
                format!("Your {} subscription is active until {}.", plan, end)
            }
            SubscriptionEvent::Renewed => {
                format!("Your {} subscription has been extended until {}.", plan, end)
            }
            SubscriptionEvent::CanceledImmediately => {
                format!("Your {} subscription has been cancelled.", plan)
            }
            SubscriptionEvent::CancellationScheduled => format!(
                "Your {} subscription will not renew and stays usable until {}.",
                plan, end
            ),
            SubscriptionEvent::ExpiringSoon => format!(
                "Your {} subscription expires in {} day(s), on {}. Renew it to keep receiving trips.",
                plan,
                subscription.days_remaining(today),
                end
            ),
            SubscriptionEvent::ExpiringToday => format!(
                "Your {} subscription expires today. Renew it to keep receiving trips.",
                plan
            ),
            SubscriptionEvent::Expired => format!(
                "Your {} subscription expired on {}. Subscribe again to resume trips.",
                plan, end
            ),
            SubscriptionEvent::AutoRenewed => format!(
                "Your {} subscription was renewed automatically until {}.",
                plan, end
            ),
            SubscriptionEvent::AutoRenewFailed => format!(
                "We could not renew your {} subscription automatically. Please renew it manually.",
                plan
            ),
            SubscriptionEvent::RenewalReverted => format!(
                "The renewal payment for your {} subscription did not go through. Your period ends on {}.",
                plan, end
            ),
        }
    }
}
