//! GetSubscriptionOverviewHandler - Query handler for the subscriber's view.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::billing::{BillingError, LifecyclePhase, Subscription};
use crate::domain::foundation::{AuthenticatedUser, Role};
use crate::ports::BillingReader;

const HISTORY_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct GetSubscriptionOverviewQuery {
    pub actor: AuthenticatedUser,
    pub today: NaiveDate,
}

/// Current subscription with its derived phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentSubscription {
    pub subscription: Subscription,
    pub phase: LifecyclePhase,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetSubscriptionOverviewResult {
    pub current: Option<CurrentSubscription>,
    /// Most recent subscriptions first.
    pub history: Vec<Subscription>,
}

/// Handler for the subscriber's subscription overview.
pub struct GetSubscriptionOverviewHandler {
    reader: Arc<dyn BillingReader>,
}

impl GetSubscriptionOverviewHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionOverviewQuery,
    ) -> Result<GetSubscriptionOverviewResult, BillingError> {
        query.actor.require_role(Role::Driver)?;
        let user_id = query.actor.id;

        let current = self
            .reader
            .find_current_subscription(user_id)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))?
            .map(|subscription| CurrentSubscription {
                phase: subscription.phase_on(query.today),
                days_remaining: subscription.days_remaining(query.today),
                subscription,
            });

        let history = self
            .reader
            .list_subscription_history(user_id, HISTORY_LIMIT)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))?;

        Ok(GetSubscriptionOverviewResult { current, history })
    }
}
