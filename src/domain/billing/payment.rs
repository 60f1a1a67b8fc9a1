//! Payment attempts and their settlement state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, StateMachine, Timestamp, UserId, ValidationError,
};

use super::PaymentInstrument;

/// Provider recorded on payments created by the reconciliation sweep.
pub const SYSTEM_PROVIDER: &str = "System";

/// Settlement status of a payment.
///
/// Transitions only move forward out of `Pending`; settled payments are never
/// reprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    /// Recorded as funded without a gateway round trip (automatic renewal).
    Paid,
    Failed,
    Cancelled,
    /// Confirmed by the gateway webhook.
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Completed => "completed",
        }
    }

    /// Funds actually moved.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Completed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Paid) | (Pending, Failed) | (Pending, Cancelled) | (Pending, Completed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Paid, Failed, Cancelled, Completed],
            Paid | Failed | Cancelled | Completed => vec![],
        }
    }
}

/// How the funds were (or will be) moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    MobileMoney,
    Cash,
    AutoRenew,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodKind::Card => "card",
            PaymentMethodKind::MobileMoney => "mobile_money",
            PaymentMethodKind::Cash => "cash",
            PaymentMethodKind::AutoRenew => "auto_renew",
        }
    }
}

impl FromStr for PaymentMethodKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethodKind::Card),
            "mobile_money" => Ok(PaymentMethodKind::MobileMoney),
            "cash" => Ok(PaymentMethodKind::Cash),
            "auto_renew" => Ok(PaymentMethodKind::AutoRenew),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown method '{}'", other),
            )),
        }
    }
}

/// What the payment funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Subscription,
    SubscriptionRenewal,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Subscription => "subscription",
            PaymentPurpose::SubscriptionRenewal => "subscription_renewal",
        }
    }
}

impl FromStr for PaymentPurpose {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(PaymentPurpose::Subscription),
            "subscription_renewal" => Ok(PaymentPurpose::SubscriptionRenewal),
            other => Err(ValidationError::invalid_format(
                "payment_type",
                format!("unknown payment type '{}'", other),
            )),
        }
    }
}

/// Prefix of a locally generated transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePrefix {
    Subscribe,
    Renew,
    AutoRenew,
}

impl ReferencePrefix {
    fn as_str(&self) -> &'static str {
        match self {
            ReferencePrefix::Subscribe => "SUB",
            ReferencePrefix::Renew => "RNW",
            ReferencePrefix::AutoRenew => "AUTO",
        }
    }
}

/// Unique reference correlating a payment with the gateway (`ref_command`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Generates `{PREFIX}-{unix millis}-{9 random chars}`.
    pub fn generate(prefix: ReferencePrefix) -> Self {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!(
            "{}-{}-{}",
            prefix.as_str(),
            Timestamp::now().as_unix_millis(),
            &random[..9]
        ))
    }

    /// Wraps a reference received from the gateway.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::empty_field("ref_command"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One funds-movement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub amount: i64,
    pub method: PaymentMethodKind,
    /// Mobile-money operator, card processor or `System`.
    pub provider: Option<String>,
    pub purpose: PaymentPurpose,
    pub status: PaymentStatus,
    pub transaction_id: TransactionReference,

    pub card_holder_name: Option<String>,
    pub card_last4: Option<String>,
    pub card_token: Option<String>,
    pub mobile_number: Option<String>,

    pub gateway_token: Option<String>,
    pub redirect_url: Option<String>,
    pub failure_reason: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    /// Creates a pending payment funded by `instrument`.
    pub fn pending(
        user_id: UserId,
        amount: i64,
        purpose: PaymentPurpose,
        prefix: ReferencePrefix,
        instrument: &PaymentInstrument,
    ) -> Self {
        let now = Timestamp::now();
        let mut payment = Self {
            id: PaymentId::new(),
            user_id,
            amount,
            method: instrument.kind(),
            provider: None,
            purpose,
            status: PaymentStatus::Pending,
            transaction_id: TransactionReference::generate(prefix),
            card_holder_name: None,
            card_last4: None,
            card_token: None,
            mobile_number: None,
            gateway_token: None,
            redirect_url: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        match instrument {
            PaymentInstrument::Card(card) => {
                payment.provider = Some(card.brand.to_string());
                payment.card_holder_name = Some(card.holder_name.clone());
                payment.card_last4 = Some(card.last4.clone());
                payment.card_token = Some(card.token.clone());
            }
            PaymentInstrument::MobileMoney(mobile) => {
                payment.provider = Some(mobile.provider.to_string());
                payment.mobile_number = Some(mobile.number.clone());
            }
        }
        payment
    }

    /// A renewal recorded as paid by the reconciliation sweep.
    pub fn automatic_renewal(user_id: UserId, amount: i64) -> Self {
        let now = Timestamp::now();
        Self {
            id: PaymentId::new(),
            user_id,
            amount,
            method: PaymentMethodKind::AutoRenew,
            provider: Some(SYSTEM_PROVIDER.to_string()),
            purpose: PaymentPurpose::SubscriptionRenewal,
            status: PaymentStatus::Paid,
            transaction_id: TransactionReference::generate(ReferencePrefix::AutoRenew),
            card_holder_name: None,
            card_last4: None,
            card_token: None,
            mobile_number: None,
            gateway_token: None,
            redirect_url: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the gateway session handed back for this payment.
    pub fn attach_gateway_session(&mut self, token: impl Into<String>, redirect_url: impl Into<String>) {
        self.gateway_token = Some(token.into());
        self.redirect_url = Some(redirect_url.into());
        self.updated_at = Timestamp::now();
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Completed)
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Cancelled)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition payment {} from {} to {}",
                    self.transaction_id, self.status, target
                ),
            )
        })?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{MobileMoneyInstrument, MobileProvider};

    fn wave() -> PaymentInstrument {
        PaymentInstrument::MobileMoney(MobileMoneyInstrument {
            number: "771234567".to_string(),
            provider: MobileProvider::Wave,
        })
    }

    fn pending_payment() -> Payment {
        Payment::pending(
            UserId::new(3).unwrap(),
            5000,
            PaymentPurpose::Subscription,
            ReferencePrefix::Subscribe,
            &wave(),
        )
    }

    #[test]
    fn pending_mobile_payment_records_operator() {
        let payment = pending_payment();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.method, PaymentMethodKind::MobileMoney);
        assert_eq!(payment.provider.as_deref(), Some("Wave"));
        assert_eq!(payment.mobile_number.as_deref(), Some("771234567"));
        assert!(payment.card_last4.is_none());
    }

    #[test]
    fn transaction_reference_has_prefix_and_shape() {
        let reference = TransactionReference::generate(ReferencePrefix::Renew);
        let parts: Vec<_> = reference.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "RNW");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn transaction_references_are_unique() {
        let a = TransactionReference::generate(ReferencePrefix::Subscribe);
        let b = TransactionReference::generate(ReferencePrefix::Subscribe);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!(TransactionReference::new("  ").is_err());
    }

    #[test]
    fn complete_settles_pending_payment() {
        let mut payment = pending_payment();
        payment.complete().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.status.is_settled());
    }

    #[test]
    fn settled_payment_is_never_reprocessed() {
        let mut payment = pending_payment();
        payment.complete().unwrap();

        assert!(payment.complete().is_err());
        assert!(payment.cancel().is_err());
        assert!(payment.fail("late").is_err());
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[test]
    fn fail_records_reason() {
        let mut payment = pending_payment();
        payment.fail("insufficient funds").unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason.as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn automatic_renewal_is_paid_system_payment() {
        let payment = Payment::automatic_renewal(UserId::new(3).unwrap(), 5000);
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.method, PaymentMethodKind::AutoRenew);
        assert_eq!(payment.provider.as_deref(), Some(SYSTEM_PROVIDER));
        assert!(payment.transaction_id.as_str().starts_with("AUTO-"));
    }

    #[test]
    fn only_pending_has_outgoing_transitions() {
        assert!(!PaymentStatus::Pending.is_terminal());
        for status in [
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Completed,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn enum_strings_round_trip() {
        assert_eq!("mobile_money".parse::<PaymentMethodKind>().unwrap(), PaymentMethodKind::MobileMoney);
        assert_eq!("subscription_renewal".parse::<PaymentPurpose>().unwrap(), PaymentPurpose::SubscriptionRenewal);
        assert_eq!("cancelled".parse::<PaymentStatus>().unwrap(), PaymentStatus::Cancelled);
    }
}
