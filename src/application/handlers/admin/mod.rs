//! Administration queries.

mod get_payment_summary;
mod list_active_subscriptions;

pub use get_payment_summary::{
    GetPaymentSummaryHandler, GetPaymentSummaryQuery, GetPaymentSummaryResult,
};
pub use list_active_subscriptions::{
    ListActiveSubscriptionsHandler, ListActiveSubscriptionsQuery, ListActiveSubscriptionsResult,
};
