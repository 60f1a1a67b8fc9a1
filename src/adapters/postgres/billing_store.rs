//! PostgreSQL implementation of BillingStore.
//!
//! Each unit of work owns one pooled connection inside an open transaction.
//! Dropping an uncommitted transaction rolls it back and returns the
//! connection to the pool.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::domain::billing::{
    Payment, Plan, SavedPaymentMethod, Subscription, TransactionReference,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, PaymentMethodId, PlanId, SubscriptionId, UserId,
};
use crate::domain::notification::NewNotification;
use crate::ports::{BillingStore, BillingTransaction};

use super::notification_inbox::insert_notification;
use super::rows::{
    database_error, row_to_payment, row_to_payment_method, row_to_plan, row_to_subscription,
    InstrumentColumns, RenewalHoldColumns, PAYMENT_COLUMNS, PAYMENT_METHOD_COLUMNS, PLAN_COLUMNS,
    SUBSCRIPTION_COLUMNS,
};

/// PostgreSQL implementation of BillingStore.
#[derive(Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin transaction", e))?;
        Ok(Box::new(PostgresBillingTransaction { tx: Some(tx) }))
    }
}

struct PostgresBillingTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresBillingTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, DomainError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| DomainError::new(ErrorCode::InternalError, "Transaction already finished"))
    }

    async fn subscriptions_where(
        &mut self,
        filter: &str,
        bind: impl FnOnce(
            sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
        ) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE {}", SUBSCRIPTION_COLUMNS, filter);
        let rows = bind(sqlx::query(&sql))
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| database_error("fetch subscriptions", e))?;
        rows.iter().map(row_to_subscription).collect()
    }
}

#[async_trait]
impl BillingTransaction for PostgresBillingTransaction {
    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>, DomainError> {
        let sql = format!("SELECT {} FROM plans WHERE id = $1", PLAN_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| database_error("fetch plan", e))?;
        row.as_ref().map(row_to_plan).transpose()
    }

    async fn lock_user(&mut self, user_id: UserId) -> Result<(), DomainError> {
        // Transaction-scoped: released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id.as_i64())
            .execute(self.conn()?)
            .await
            .map_err(|e| database_error("lock user", e))?;
        Ok(())
    }

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let found = self
            .subscriptions_where("id = $1 FOR UPDATE", |q| q.bind(*id.as_uuid()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn find_active_subscription(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let found = self
            .subscriptions_where("user_id = $1 AND status = 'active' FOR UPDATE", |q| {
                q.bind(user_id.as_i64())
            })
            .await?;
        Ok(found.into_iter().next())
    }

    async fn find_subscription_by_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<Option<Subscription>, DomainError> {
        let found = self
            .subscriptions_where("payment_id = $1 FOR UPDATE", |q| {
                q.bind(*payment_id.as_uuid())
            })
            .await?;
        Ok(found.into_iter().next())
    }

    async fn find_active_ending_between(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.subscriptions_where(
            "status = 'active' AND end_date BETWEEN $1 AND $2 ORDER BY end_date",
            |q| q.bind(from).bind(to),
        )
        .await
    }

    async fn find_renewal_holds_requested_by(
        &mut self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.subscriptions_where(
            "renewal_payment_id IS NOT NULL AND renewal_requested_on <= $1 \
             ORDER BY renewal_requested_on FOR UPDATE",
            |q| q.bind(cutoff),
        )
        .await
    }

    async fn find_active_lapsed(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.subscriptions_where(
            "status = 'active' AND end_date < $1 ORDER BY end_date FOR UPDATE",
            |q| q.bind(today),
        )
        .await
    }

    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        let hold = RenewalHoldColumns::from_subscription(subscription);
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, plan_name, price, start_date, end_date, status,
                auto_renew, payment_id, canceled_at, cancellation_reason,
                renewal_payment_id, renewal_requested_on, prior_end_date, prior_status,
                prior_payment_id, prior_canceled_at, prior_cancellation_reason,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_i64())
        .bind(subscription.plan_id.as_uuid())
        .bind(&subscription.plan_name)
        .bind(subscription.price)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.status.as_str())
        .bind(subscription.auto_renew)
        .bind(subscription.payment_id.map(|id| *id.as_uuid()))
        .bind(subscription.canceled_at.map(|t| *t.as_datetime()))
        .bind(&subscription.cancellation_reason)
        .bind(hold.payment_id)
        .bind(hold.requested_on)
        .bind(hold.prior_end_date)
        .bind(hold.prior_status)
        .bind(hold.prior_payment_id)
        .bind(hold.prior_canceled_at)
        .bind(hold.prior_cancellation_reason)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("insert subscription", e))?;

        Ok(())
    }

    async fn update_subscription(&mut self, subscription: &Subscription) -> Result<(), DomainError> {
        let hold = RenewalHoldColumns::from_subscription(subscription);
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                start_date = $2,
                end_date = $3,
                status = $4,
                auto_renew = $5,
                payment_id = $6,
                canceled_at = $7,
                cancellation_reason = $8,
                updated_at = $9,
                renewal_payment_id = $10,
                renewal_requested_on = $11,
                prior_end_date = $12,
                prior_status = $13,
                prior_payment_id = $14,
                prior_canceled_at = $15,
                prior_cancellation_reason = $16
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.status.as_str())
        .bind(subscription.auto_renew)
        .bind(subscription.payment_id.map(|id| *id.as_uuid()))
        .bind(subscription.canceled_at.map(|t| *t.as_datetime()))
        .bind(&subscription.cancellation_reason)
        .bind(subscription.updated_at.as_datetime())
        .bind(hold.payment_id)
        .bind(hold.requested_on)
        .bind(hold.prior_end_date)
        .bind(hold.prior_status)
        .bind(hold.prior_payment_id)
        .bind(hold.prior_canceled_at)
        .bind(hold.prior_cancellation_reason)
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", subscription.id),
            ));
        }

        Ok(())
    }

    async fn find_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1 FOR UPDATE", PAYMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| database_error("fetch payment", e))?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_payment_by_reference(
        &mut self,
        reference: &TransactionReference,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE transaction_id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(reference.as_str())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| database_error("fetch payment by reference", e))?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, amount, method, provider, purpose, status, transaction_id,
                card_holder_name, card_last4, card_token, mobile_number,
                gateway_token, redirect_url, failure_reason, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_i64())
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(&payment.provider)
        .bind(payment.purpose.as_str())
        .bind(payment.status.as_str())
        .bind(payment.transaction_id.as_str())
        .bind(&payment.card_holder_name)
        .bind(&payment.card_last4)
        .bind(&payment.card_token)
        .bind(&payment.mobile_number)
        .bind(&payment.gateway_token)
        .bind(&payment.redirect_url)
        .bind(&payment.failure_reason)
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("insert payment", e))?;

        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                gateway_token = $3,
                redirect_url = $4,
                failure_reason = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.gateway_token)
        .bind(&payment.redirect_url)
        .bind(&payment.failure_reason)
        .bind(payment.updated_at.as_datetime())
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("update payment", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment not found: {}", payment.id),
            ));
        }

        Ok(())
    }

    async fn find_payment_method(
        &mut self,
        id: PaymentMethodId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payment_methods WHERE id = $1 FOR UPDATE",
            PAYMENT_METHOD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| database_error("fetch payment method", e))?;
        row.as_ref().map(row_to_payment_method).transpose()
    }

    async fn find_default_payment_method(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<SavedPaymentMethod>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payment_methods WHERE user_id = $1 AND is_default",
            PAYMENT_METHOD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_i64())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| database_error("fetch default payment method", e))?;
        row.as_ref().map(row_to_payment_method).transpose()
    }

    async fn count_payment_methods(&mut self, user_id: UserId) -> Result<u64, DomainError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payment_methods WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| database_error("count payment methods", e))?;

        Ok(count.0 as u64)
    }

    async fn insert_payment_method(
        &mut self,
        method: &SavedPaymentMethod,
    ) -> Result<(), DomainError> {
        let columns = InstrumentColumns::from_instrument(&method.instrument);
        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                id, user_id, method_type, nickname, is_default,
                card_holder_name, card_last4, card_brand, card_exp_month, card_exp_year,
                card_token, mobile_number, mobile_provider, created_at, last_used_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(method.id.as_uuid())
        .bind(method.user_id.as_i64())
        .bind(columns.method_type)
        .bind(&method.nickname)
        .bind(method.is_default)
        .bind(columns.card_holder_name)
        .bind(columns.card_last4)
        .bind(columns.card_brand)
        .bind(columns.card_exp_month)
        .bind(columns.card_exp_year)
        .bind(columns.card_token)
        .bind(columns.mobile_number)
        .bind(columns.mobile_provider)
        .bind(method.created_at.as_datetime())
        .bind(method.last_used_at.map(|t| *t.as_datetime()))
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("insert payment method", e))?;

        Ok(())
    }

    async fn update_payment_method(
        &mut self,
        method: &SavedPaymentMethod,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_methods SET
                nickname = $2,
                is_default = $3,
                last_used_at = $4
            WHERE id = $1
            "#,
        )
        .bind(method.id.as_uuid())
        .bind(&method.nickname)
        .bind(method.is_default)
        .bind(method.last_used_at.map(|t| *t.as_datetime()))
        .execute(self.conn()?)
        .await
        .map_err(|e| database_error("update payment method", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::PaymentMethodNotFound,
                format!("Payment method not found: {}", method.id),
            ));
        }

        Ok(())
    }

    async fn delete_payment_method(&mut self, id: PaymentMethodId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| database_error("delete payment method", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_default_payment_method(&mut self, user_id: UserId) -> Result<(), DomainError> {
        sqlx::query("UPDATE payment_methods SET is_default = FALSE WHERE user_id = $1 AND is_default")
            .bind(user_id.as_i64())
            .execute(self.conn()?)
            .await
            .map_err(|e| database_error("clear default payment method", e))?;

        Ok(())
    }

    async fn publish_notification(
        &mut self,
        notification: &NewNotification,
    ) -> Result<bool, DomainError> {
        insert_notification(self.conn()?, notification).await
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        let tx = self.tx.take().ok_or_else(|| {
            DomainError::new(ErrorCode::InternalError, "Transaction already finished")
        })?;
        tx.commit()
            .await
            .map_err(|e| database_error("commit transaction", e))
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| database_error("roll back transaction", e)),
            None => Ok(()),
        }
    }
}
