use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::Subscription;
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::ports::PaymentSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSubscriptionResponse {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_name: String,
    pub price: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub auto_renew: bool,
}

impl From<Subscription> for ActiveSubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            plan_name: s.plan_name,
            price: s.price,
            start_date: s.start_date,
            end_date: s.end_date,
            auto_renew: s.auto_renew,
        }
    }
}

/// Query string of `GET /api/admin/payments/summary`. Defaults to the current month.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryParams {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummaryResponse {
    pub month: u32,
    pub year: i32,
    #[serde(flatten)]
    pub summary: PaymentSummary,
}
