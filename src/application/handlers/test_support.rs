//! Shared fixtures for handler tests.

use chrono::NaiveDate;

use crate::adapters::memory::InMemoryBillingStore;
use crate::domain::billing::Plan;
use crate::domain::foundation::{AuthenticatedUser, Role, UserId};

pub(crate) use crate::domain::billing::test_support::*;

pub(crate) fn driver(id: i64) -> AuthenticatedUser {
    AuthenticatedUser::new(UserId::new(id).unwrap(), Role::Driver)
}

pub(crate) fn parent(id: i64) -> AuthenticatedUser {
    AuthenticatedUser::new(UserId::new(id).unwrap(), Role::Parent)
}

pub(crate) fn admin() -> AuthenticatedUser {
    AuthenticatedUser::new(UserId::new(1).unwrap(), Role::Admin)
}

pub(crate) fn today() -> NaiveDate {
    date(2026, 3, 10)
}

/// Store seeded with the monthly driver plan.
pub(crate) async fn store_with_plan() -> (InMemoryBillingStore, Plan) {
    let store = InMemoryBillingStore::new();
    let plan = monthly_driver_plan();
    store.add_plan(plan.clone()).await;
    (store, plan)
}
