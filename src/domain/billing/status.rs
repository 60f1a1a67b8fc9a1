//! Subscription status state machine and derived lifecycle phase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Stored status of a driver subscription.
///
/// At most one subscription per user is `Active` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created by a subscribe request, waiting for the gateway to confirm
    /// the funding payment.
    PendingPayment,

    /// Funded and usable until `end_date`.
    Active,

    /// Cancelled immediately by the subscriber.
    Canceled,

    /// Lapsed past `end_date` and deactivated by the sweep.
    Expired,

    /// Replaced by a newer subscription of the same user.
    Superseded,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::PendingPayment => "pending_payment",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Superseded => "superseded",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Inactive subscriptions that a renewal may bring back.
    pub fn is_renewable(&self) -> bool {
        !matches!(self, SubscriptionStatus::PendingPayment)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(SubscriptionStatus::PendingPayment),
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "expired" => Ok(SubscriptionStatus::Expired),
            "superseded" => Ok(SubscriptionStatus::Superseded),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (PendingPayment, Active)
                | (PendingPayment, Superseded)
                | (Active, Active) // Renewal
                | (Active, Canceled)
                | (Active, Expired)
                | (Active, Superseded)
                | (Canceled, Active)
                | (Expired, Active)
                | (Superseded, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            PendingPayment => vec![Active, Superseded],
            Active => vec![Active, Canceled, Expired, Superseded],
            Canceled | Expired | Superseded => vec![Active],
        }
    }
}

/// Phase reported to subscribers, derived from status and calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    PendingPayment,
    Active,
    ExpiringSoon,
    /// Cancelled, either immediately or scheduled for the end of the period.
    Canceled,
    Expired,
    Inactive,
}
