//! GetPaymentSummaryHandler - Admin query for monthly payment figures.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{AuthenticatedUser, Role, ValidationError};
use crate::ports::{BillingReader, PaymentSummary};

#[derive(Debug, Clone)]
pub struct GetPaymentSummaryQuery {
    pub actor: AuthenticatedUser,
    /// 1 to 12.
    pub month: u32,
    pub year: i32,
}

pub type GetPaymentSummaryResult = PaymentSummary;

pub struct GetPaymentSummaryHandler {
    reader: Arc<dyn BillingReader>,
}

impl GetPaymentSummaryHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetPaymentSummaryQuery,
    ) -> Result<GetPaymentSummaryResult, BillingError> {
        query.actor.require_role(Role::Admin)?;
        let (from, to) = month_bounds(query.year, query.month)?;

        self.reader
            .payment_summary(from, to)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))
    }
}

/// First day of the month and first day of the following month.
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ValidationError::out_of_range("month", 1, 12, month as i64))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let to = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| ValidationError::invalid_format("year", "out of supported range"))?;
    Ok((from, to))
}
