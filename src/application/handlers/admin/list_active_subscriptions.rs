//! ListActiveSubscriptionsHandler - Admin query over active subscriptions.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::{AuthenticatedUser, Role};
use crate::ports::BillingReader;

#[derive(Debug, Clone)]
pub struct ListActiveSubscriptionsQuery {
    pub actor: AuthenticatedUser,
}

/// Active subscriptions, soonest end date first.
pub type ListActiveSubscriptionsResult = Vec<Subscription>;

pub struct ListActiveSubscriptionsHandler {
    reader: Arc<dyn BillingReader>,
}

impl ListActiveSubscriptionsHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: ListActiveSubscriptionsQuery,
    ) -> Result<ListActiveSubscriptionsResult, BillingError> {
        query.actor.require_role(Role::Admin)?;

        self.reader
            .list_active_subscriptions()
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))
    }
}
