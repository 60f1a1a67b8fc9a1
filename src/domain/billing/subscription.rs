//! Subscription aggregate entity.
//!
//! A subscription grants a driver access for `[start_date, end_date]`.
//! Dates are calendar days in UTC; `end_date` is inclusive.
//!
//! # Invariants
//!
//! - `end_date = start_date + plan.duration_days` when a period is opened
//! - renewals extend `end_date` additively unless the period already lapsed
//! - `payment_id` references the payment that funded the current period
//! - a renewal awaiting its payment keeps a [`RenewalHold`] with the period it
//!   replaced; at most one renewal is pending at a time

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, PlanId, StateMachine, SubscriptionId, Timestamp, UserId,
};

use super::{LifecyclePhase, Plan, SubscriptionStatus};

/// Subscriptions ending within this many days are reported as expiring soon.
pub const EXPIRING_SOON_WINDOW_DAYS: u64 = 7;

/// Renewal checkouts still unpaid after this many days are released.
pub const RENEWAL_HOLD_DAYS: u64 = 2;

/// State a pending renewal replaced, kept until its payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalHold {
    /// Payment that has to settle for the extension to stand.
    pub payment_id: PaymentId,
    pub requested_on: NaiveDate,
    pub previous_end_date: NaiveDate,
    pub previous_status: SubscriptionStatus,
    pub previous_payment_id: Option<PaymentId>,
    pub previous_canceled_at: Option<Timestamp>,
    pub previous_cancellation_reason: Option<String>,
}

impl RenewalHold {
    /// True once the checkout has been open for [`RENEWAL_HOLD_DAYS`].
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        add_days(self.requested_on, Days::new(RENEWAL_HOLD_DAYS)) <= today
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,

    /// Plan name and price captured at purchase time.
    pub plan_name: String,
    pub price: i64,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,

    pub payment_id: Option<PaymentId>,
    pub canceled_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_hold: Option<RenewalHold>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn add_days(date: NaiveDate, days: Days) -> NaiveDate {
    date.checked_add_days(days).unwrap_or(NaiveDate::MAX)
}

impl Subscription {
    /// Opens a subscription awaiting its funding payment.
    pub fn pending(
        user_id: UserId,
        plan: &Plan,
        payment_id: PaymentId,
        auto_renew: bool,
        today: NaiveDate,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            price: plan.price,
            start_date: today,
            end_date: add_days(today, plan.duration()),
            status: SubscriptionStatus::PendingPayment,
            auto_renew,
            payment_id: Some(payment_id),
            canceled_at: None,
            cancellation_reason: None,
            renewal_hold: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Days left in the current period, zero once lapsed.
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days().max(0)
    }

    pub fn has_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }

    /// Phase shown to the subscriber on `today`.
    pub fn phase_on(&self, today: NaiveDate) -> LifecyclePhase {
        match self.status {
            SubscriptionStatus::PendingPayment => LifecyclePhase::PendingPayment,
            SubscriptionStatus::Canceled => LifecyclePhase::Canceled,
            SubscriptionStatus::Expired => LifecyclePhase::Expired,
            SubscriptionStatus::Superseded => LifecyclePhase::Inactive,
            SubscriptionStatus::Active => {
                if self.has_lapsed(today) {
                    LifecyclePhase::Expired
                } else if self.canceled_at.is_some() {
                    LifecyclePhase::Canceled
                } else if self.end_date <= add_days(today, Days::new(EXPIRING_SOON_WINDOW_DAYS)) {
                    LifecyclePhase::ExpiringSoon
                } else {
                    LifecyclePhase::Active
                }
            }
        }
    }

    /// Funds a pending subscription: the period restarts on `today`.
    pub fn activate(&mut self, today: NaiveDate, duration: Days) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::PendingPayment {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.start_date = today;
        self.end_date = add_days(today, duration);
        self.touch();
        Ok(())
    }

    /// Extends the subscription with an already settled payment.
    ///
    /// Unexpired periods grow from the current `end_date`; lapsed ones restart
    /// from `today`. Any scheduled cancellation is withdrawn.
    pub fn renew(
        &mut self,
        today: NaiveDate,
        duration: Days,
        payment_id: PaymentId,
    ) -> Result<(), DomainError> {
        if !self.status.is_renewable() {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        if self.renewal_hold.is_some() {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                "A renewal payment is still pending for this subscription",
            ));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.end_date = if self.end_date > today {
            add_days(self.end_date, duration)
        } else {
            add_days(today, duration)
        };
        self.payment_id = Some(payment_id);
        self.canceled_at = None;
        self.cancellation_reason = None;
        self.touch();
        Ok(())
    }

    /// Extends the subscription ahead of a payment that has not settled yet.
    ///
    /// The replaced state is kept in a [`RenewalHold`] until the payment is
    /// confirmed or released.
    pub fn renew_pending(
        &mut self,
        today: NaiveDate,
        duration: Days,
        payment_id: PaymentId,
    ) -> Result<(), DomainError> {
        let hold = RenewalHold {
            payment_id,
            requested_on: today,
            previous_end_date: self.end_date,
            previous_status: self.status,
            previous_payment_id: self.payment_id,
            previous_canceled_at: self.canceled_at,
            previous_cancellation_reason: self.cancellation_reason.clone(),
        };
        self.renew(today, duration, payment_id)?;
        self.renewal_hold = Some(hold);
        Ok(())
    }

    /// Makes a pending renewal final. Returns false if `payment_id` does not
    /// fund the pending renewal.
    pub fn confirm_renewal(&mut self, payment_id: PaymentId) -> bool {
        if !self.holds_renewal(payment_id) {
            return false;
        }
        self.renewal_hold = None;
        self.touch();
        true
    }

    /// Restores the state a pending renewal replaced. Returns false if
    /// `payment_id` does not fund the pending renewal.
    ///
    /// A subscription deactivated since the renewal keeps its current status.
    pub fn release_renewal(&mut self, payment_id: PaymentId) -> bool {
        if !self.holds_renewal(payment_id) {
            return false;
        }
        let Some(hold) = self.renewal_hold.take() else {
            return false;
        };
        self.end_date = hold.previous_end_date;
        self.payment_id = hold.previous_payment_id;
        if self.is_active() {
            self.status = hold.previous_status;
            self.canceled_at = hold.previous_canceled_at;
            self.cancellation_reason = hold.previous_cancellation_reason;
        }
        self.touch();
        true
    }

    fn holds_renewal(&self, payment_id: PaymentId) -> bool {
        self.renewal_hold
            .as_ref()
            .is_some_and(|hold| hold.payment_id == payment_id)
    }

    /// Cancels an active subscription.
    ///
    /// Immediate cancellation deactivates now; a deferred one only stops
    /// auto-renewal and lets the period run out.
    pub fn cancel(&mut self, immediate: bool, reason: impl Into<String>) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(self.invalid_transition(SubscriptionStatus::Canceled));
        }
        if immediate {
            self.transition_to(SubscriptionStatus::Canceled)?;
        }
        self.auto_renew = false;
        self.canceled_at = Some(Timestamp::now());
        self.cancellation_reason = Some(reason.into());
        self.touch();
        Ok(())
    }

    /// Deactivates a subscription whose period has passed.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Expired)?;
        self.touch();
        Ok(())
    }

    /// Deactivates a subscription replaced by a newer one.
    pub fn supersede(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Superseded)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    fn invalid_transition(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot transition subscription from {} to {}",
                self.status, target
            ),
        )
        .with_detail("current", self.status.as_str())
        .with_detail("attempted", target.as_str())
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(&target) {
            return Err(self.invalid_transition(target));
        }
        self.status = target;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{active_subscription, date};
    use super::*;
    use crate::domain::billing::plan::fixtures::monthly_driver_plan;

    fn user() -> UserId {
        UserId::new(12).unwrap()
    }

    // ════════════════════════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn pending_subscription_covers_plan_duration() {
        let plan = monthly_driver_plan();
        let payment = PaymentId::new();
        let sub = Subscription::pending(user(), &plan, payment, true, date(2026, 3, 1));

        assert_eq!(sub.status, SubscriptionStatus::PendingPayment);
        assert_eq!(sub.start_date, date(2026, 3, 1));
        assert_eq!(sub.end_date, date(2026, 3, 31));
        assert_eq!(sub.payment_id, Some(payment));
        assert_eq!(sub.price, 5000);
        assert_eq!(sub.plan_name, "Mensuel");
        assert!(sub.auto_renew);
        assert!(!sub.is_active());
    }

    // ════════════════════════════════════════════════════════════════
    // Activation
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn activate_restarts_period_on_settlement_day() {
        let plan = monthly_driver_plan();
        let mut sub = Subscription::pending(user(), &plan, PaymentId::new(), false, date(2026, 3, 1));

        sub.activate(date(2026, 3, 3), plan.duration()).unwrap();

        assert!(sub.is_active());
        assert_eq!(sub.start_date, date(2026, 3, 3));
        assert_eq!(sub.end_date, date(2026, 4, 2));
    }

    #[test]
    fn activate_rejects_already_active_subscription() {
        let mut sub = active_subscription(user(), date(2026, 4, 1));
        let err = sub.activate(date(2026, 3, 3), Days::new(30)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    // ════════════════════════════════════════════════════════════════
    // Renewal
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn renew_unexpired_extends_from_current_end() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        let payment = PaymentId::new();

        sub.renew(date(2026, 4, 1), Days::new(30), payment).unwrap();

        assert_eq!(sub.end_date, date(2026, 5, 10));
        assert_eq!(sub.payment_id, Some(payment));
    }

    #[test]
    fn renew_lapsed_resets_from_today() {
        let mut sub = active_subscription(user(), date(2026, 3, 20));
        sub.expire().unwrap();

        sub.renew(date(2026, 4, 1), Days::new(30), PaymentId::new()).unwrap();

        assert!(sub.is_active());
        assert_eq!(sub.end_date, date(2026, 5, 1));
    }

    #[test]
    fn renew_withdraws_scheduled_cancellation() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.cancel(false, "Scheduled cancellation").unwrap();

        sub.renew(date(2026, 4, 1), Days::new(30), PaymentId::new()).unwrap();

        assert!(sub.canceled_at.is_none());
        assert!(sub.cancellation_reason.is_none());
    }

    #[test]
    fn pending_renewal_keeps_replaced_period() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        let previous_payment = sub.payment_id;
        let payment = PaymentId::new();

        sub.renew_pending(date(2026, 4, 1), Days::new(30), payment).unwrap();

        assert_eq!(sub.end_date, date(2026, 5, 10));
        let hold = sub.renewal_hold.as_ref().unwrap();
        assert_eq!(hold.payment_id, payment);
        assert_eq!(hold.previous_end_date, date(2026, 4, 10));
        assert_eq!(hold.previous_payment_id, previous_payment);
    }

    #[test]
    fn second_renewal_waits_for_the_first_payment() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.renew_pending(date(2026, 4, 1), Days::new(30), PaymentId::new()).unwrap();

        let err = sub
            .renew_pending(date(2026, 4, 1), Days::new(30), PaymentId::new())
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(sub.end_date, date(2026, 5, 10));
    }

    #[test]
    fn confirmed_renewal_keeps_extension() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        let payment = PaymentId::new();
        sub.renew_pending(date(2026, 4, 1), Days::new(30), payment).unwrap();

        assert!(!sub.confirm_renewal(PaymentId::new()));
        assert!(sub.confirm_renewal(payment));

        assert!(sub.renewal_hold.is_none());
        assert_eq!(sub.end_date, date(2026, 5, 10));
        assert_eq!(sub.payment_id, Some(payment));
    }

    #[test]
    fn released_renewal_restores_lapsed_state() {
        let mut sub = active_subscription(user(), date(2026, 3, 20));
        sub.cancel(false, "Scheduled cancellation").unwrap();
        sub.expire().unwrap();
        let before = sub.clone();
        let payment = PaymentId::new();
        sub.renew_pending(date(2026, 4, 1), Days::new(30), payment).unwrap();
        assert!(sub.is_active());

        assert!(sub.release_renewal(payment));

        assert_eq!(sub.status, SubscriptionStatus::Expired);
        assert_eq!(sub.end_date, before.end_date);
        assert_eq!(sub.payment_id, before.payment_id);
        assert_eq!(sub.canceled_at, before.canceled_at);
        assert_eq!(sub.cancellation_reason, before.cancellation_reason);
        assert!(sub.renewal_hold.is_none());
    }

    #[test]
    fn release_ignores_other_payments() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.renew_pending(date(2026, 4, 1), Days::new(30), PaymentId::new()).unwrap();

        assert!(!sub.release_renewal(PaymentId::new()));
        assert_eq!(sub.end_date, date(2026, 5, 10));
    }

    #[test]
    fn hold_goes_stale_after_two_days() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.renew_pending(date(2026, 4, 1), Days::new(30), PaymentId::new()).unwrap();
        let hold = sub.renewal_hold.unwrap();

        assert!(!hold.is_stale(date(2026, 4, 2)));
        assert!(hold.is_stale(date(2026, 4, 3)));
    }

    #[test]
    fn renew_rejects_pending_subscription() {
        let plan = monthly_driver_plan();
        let mut sub = Subscription::pending(user(), &plan, PaymentId::new(), false, date(2026, 3, 1));
        assert!(sub.renew(date(2026, 3, 2), plan.duration(), PaymentId::new()).is_err());
    }

    // ════════════════════════════════════════════════════════════════
    // Cancellation
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn immediate_cancel_deactivates() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.auto_renew = true;

        sub.cancel(true, "moving away").unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(!sub.auto_renew);
        assert!(sub.canceled_at.is_some());
        assert_eq!(sub.cancellation_reason.as_deref(), Some("moving away"));
    }

    #[test]
    fn deferred_cancel_keeps_subscription_active() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.auto_renew = true;

        sub.cancel(false, "Scheduled cancellation").unwrap();

        assert!(sub.is_active());
        assert!(!sub.auto_renew);
        assert!(sub.canceled_at.is_some());
    }

    #[test]
    fn cancel_requires_active_subscription() {
        let mut sub = active_subscription(user(), date(2026, 4, 10));
        sub.expire().unwrap();
        let err = sub.cancel(true, "late").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(err.details.get("current"), Some(&"expired".to_string()));
    }

    // ════════════════════════════════════════════════════════════════
    // Phase and calendar
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn phase_tracks_calendar() {
        let sub = active_subscription(user(), date(2026, 4, 30));
        assert_eq!(sub.phase_on(date(2026, 4, 1)), LifecyclePhase::Active);
        assert_eq!(sub.phase_on(date(2026, 4, 23)), LifecyclePhase::ExpiringSoon);
        assert_eq!(sub.phase_on(date(2026, 4, 30)), LifecyclePhase::ExpiringSoon);
        assert_eq!(sub.phase_on(date(2026, 5, 1)), LifecyclePhase::Expired);
    }

    #[test]
    fn phase_reports_scheduled_cancellation() {
        let mut sub = active_subscription(user(), date(2026, 4, 30));
        sub.cancel(false, "Scheduled cancellation").unwrap();
        assert_eq!(sub.phase_on(date(2026, 4, 1)), LifecyclePhase::Canceled);
    }

    #[test]
    fn superseded_subscription_is_inactive() {
        let mut sub = active_subscription(user(), date(2026, 4, 30));
        sub.supersede().unwrap();
        assert_eq!(sub.phase_on(date(2026, 4, 1)), LifecyclePhase::Inactive);
    }

    #[test]
    fn days_remaining_never_negative() {
        let sub = active_subscription(user(), date(2026, 4, 10));
        assert_eq!(sub.days_remaining(date(2026, 4, 1)), 9);
        assert_eq!(sub.days_remaining(date(2026, 4, 10)), 0);
        assert_eq!(sub.days_remaining(date(2026, 4, 20)), 0);
    }
}
