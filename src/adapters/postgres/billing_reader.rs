//! PostgreSQL implementation of BillingReader.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};

use crate::domain::billing::{Plan, SavedPaymentMethod, Subscription};
use crate::domain::foundation::{DomainError, Role, UserId};
use crate::ports::{BillingReader, PaymentSummary};

use super::rows::{
    database_error, row_to_payment_method, row_to_plan, row_to_subscription,
    PAYMENT_METHOD_COLUMNS, PLAN_COLUMNS, SUBSCRIPTION_COLUMNS,
};

/// Read-side billing queries.
#[derive(Clone)]
pub struct PostgresBillingReader {
    pool: PgPool,
}

impl PostgresBillingReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingReader for PostgresBillingReader {
    async fn list_plans(&self, role: Role) -> Result<Vec<Plan>, DomainError> {
        let sql = format!(
            "SELECT {} FROM plans WHERE active AND role = $1 ORDER BY price ASC",
            PLAN_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("fetch plans", e))?;

        rows.iter().map(row_to_plan).collect()
    }

    async fn find_current_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE user_id = $1 AND status IN ('active', 'pending_payment')
            ORDER BY (status = 'active') DESC, created_at DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("fetch current subscription", e))?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn list_subscription_history(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("fetch subscription history", e))?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn list_payment_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SavedPaymentMethod>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payment_methods WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC",
            PAYMENT_METHOD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("fetch payment methods", e))?;

        rows.iter().map(row_to_payment_method).collect()
    }

    async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE status = 'active' ORDER BY end_date ASC",
            SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error("fetch active subscriptions", e))?;

        rows.iter().map(row_to_subscription).collect()
    }

    async fn payment_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PaymentSummary, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE status IN ('paid', 'completed')), 0)::BIGINT AS revenue,
                COUNT(*) FILTER (WHERE status IN ('paid', 'completed')) AS settled_count,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0)::BIGINT AS pending_amount,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed_count,
                (SELECT COUNT(*) FROM subscriptions WHERE status = 'active') AS active_subscriptions
            FROM payments
            WHERE created_at::date >= $1 AND created_at::date < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("compute payment summary", e))?;

        let count = |column: &str| -> Result<u64, DomainError> {
            row.try_get::<i64, _>(column)
                .map(|n| n as u64)
                .map_err(|e| database_error("decode payment summary", e))
        };
        let amount = |column: &str| -> Result<i64, DomainError> {
            row.try_get::<i64, _>(column)
                .map_err(|e| database_error("decode payment summary", e))
        };

        Ok(PaymentSummary {
            revenue: amount("revenue")?,
            settled_count: count("settled_count")?,
            pending_count: count("pending_count")?,
            pending_amount: amount("pending_amount")?,
            failed_count: count("failed_count")?,
            active_subscriptions: count("active_subscriptions")?,
        })
    }
}
