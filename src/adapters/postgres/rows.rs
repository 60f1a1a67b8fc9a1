//! Row decoding shared by the PostgreSQL billing adapters.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Decode, Postgres, Row, Type};
use uuid::Uuid;

use crate::domain::billing::{
    CardBrand, CardInstrument, MobileMoneyInstrument, Payment, PaymentInstrument, Plan,
    RenewalHold, SavedPaymentMethod, Subscription, SubscriptionStatus, TransactionReference,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, PaymentMethodId, PlanId, SubscriptionId, Timestamp, UserId,
    ValidationError,
};

pub(super) const PLAN_COLUMNS: &str =
    "id, name, description, price, duration_days, role, features, active";

pub(super) const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, plan_name, price, \
     start_date, end_date, status, auto_renew, payment_id, canceled_at, cancellation_reason, \
     renewal_payment_id, renewal_requested_on, prior_end_date, prior_status, prior_payment_id, \
     prior_canceled_at, prior_cancellation_reason, created_at, updated_at";

pub(super) const PAYMENT_COLUMNS: &str = "id, user_id, amount, method, provider, purpose, \
     status, transaction_id, card_holder_name, card_last4, card_token, mobile_number, \
     gateway_token, redirect_url, failure_reason, created_at, updated_at";

pub(super) const PAYMENT_METHOD_COLUMNS: &str = "id, user_id, method_type, nickname, \
     is_default, card_holder_name, card_last4, card_brand, card_exp_month, card_exp_year, \
     card_token, mobile_number, mobile_provider, created_at, last_used_at";

/// Maps a driver error, turning unique violations into conflicts.
pub(super) fn database_error(action: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DomainError::new(
                ErrorCode::Conflict,
                format!("Failed to {}: {}", action, db.message()),
            );
        }
    }
    DomainError::database(format!("Failed to {}: {}", action, err))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DomainError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| DomainError::database(format!("Failed to decode column {}: {}", column, e)))
}

fn timestamp(row: &PgRow, column: &str) -> Result<Timestamp, DomainError> {
    get::<DateTime<Utc>>(row, column).map(Timestamp::from_datetime)
}

fn optional_timestamp(row: &PgRow, column: &str) -> Result<Option<Timestamp>, DomainError> {
    Ok(get::<Option<DateTime<Utc>>>(row, column)?.map(Timestamp::from_datetime))
}

pub(super) fn row_to_plan(row: &PgRow) -> Result<Plan, DomainError> {
    let duration_days: i32 = get(row, "duration_days")?;
    Ok(Plan {
        id: PlanId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        price: get(row, "price")?,
        duration_days: u32::try_from(duration_days)
            .map_err(|_| DomainError::database("Negative plan duration"))?,
        role: get::<String>(row, "role")?.parse()?,
        features: get(row, "features")?,
        active: get(row, "active")?,
    })
}

pub(super) fn row_to_subscription(row: &PgRow) -> Result<Subscription, DomainError> {
    Ok(Subscription {
        id: SubscriptionId::from_uuid(get(row, "id")?),
        user_id: UserId::new(get(row, "user_id")?)?,
        plan_id: PlanId::from_uuid(get(row, "plan_id")?),
        plan_name: get(row, "plan_name")?,
        price: get(row, "price")?,
        start_date: get::<NaiveDate>(row, "start_date")?,
        end_date: get::<NaiveDate>(row, "end_date")?,
        status: get::<String>(row, "status")?.parse()?,
        auto_renew: get(row, "auto_renew")?,
        payment_id: get::<Option<Uuid>>(row, "payment_id")?.map(PaymentId::from_uuid),
        canceled_at: optional_timestamp(row, "canceled_at")?,
        cancellation_reason: get(row, "cancellation_reason")?,
        renewal_hold: row_to_renewal_hold(row)?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn row_to_renewal_hold(row: &PgRow) -> Result<Option<RenewalHold>, DomainError> {
    let Some(payment_id) = get::<Option<Uuid>>(row, "renewal_payment_id")? else {
        return Ok(None);
    };
    let required = |column: &str| {
        DomainError::database(format!("Renewal hold without {}", column))
    };
    Ok(Some(RenewalHold {
        payment_id: PaymentId::from_uuid(payment_id),
        requested_on: get::<Option<NaiveDate>>(row, "renewal_requested_on")?
            .ok_or_else(|| required("renewal_requested_on"))?,
        previous_end_date: get::<Option<NaiveDate>>(row, "prior_end_date")?
            .ok_or_else(|| required("prior_end_date"))?,
        previous_status: get::<Option<String>>(row, "prior_status")?
            .ok_or_else(|| required("prior_status"))?
            .parse::<SubscriptionStatus>()?,
        previous_payment_id: get::<Option<Uuid>>(row, "prior_payment_id")?.map(PaymentId::from_uuid),
        previous_canceled_at: optional_timestamp(row, "prior_canceled_at")?,
        previous_cancellation_reason: get(row, "prior_cancellation_reason")?,
    }))
}

/// Bind values of a subscription's renewal hold, all `NULL` without one.
#[derive(Debug, Default)]
pub(super) struct RenewalHoldColumns {
    pub payment_id: Option<Uuid>,
    pub requested_on: Option<NaiveDate>,
    pub prior_end_date: Option<NaiveDate>,
    pub prior_status: Option<&'static str>,
    pub prior_payment_id: Option<Uuid>,
    pub prior_canceled_at: Option<DateTime<Utc>>,
    pub prior_cancellation_reason: Option<String>,
}

impl RenewalHoldColumns {
    pub(super) fn from_subscription(subscription: &Subscription) -> Self {
        let Some(hold) = &subscription.renewal_hold else {
            return Self::default();
        };
        Self {
            payment_id: Some(*hold.payment_id.as_uuid()),
            requested_on: Some(hold.requested_on),
            prior_end_date: Some(hold.previous_end_date),
            prior_status: Some(hold.previous_status.as_str()),
            prior_payment_id: hold.previous_payment_id.map(|id| *id.as_uuid()),
            prior_canceled_at: hold.previous_canceled_at.map(|t| *t.as_datetime()),
            prior_cancellation_reason: hold.previous_cancellation_reason.clone(),
        }
    }
}

pub(super) fn row_to_payment(row: &PgRow) -> Result<Payment, DomainError> {
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        user_id: UserId::new(get(row, "user_id")?)?,
        amount: get(row, "amount")?,
        method: get::<String>(row, "method")?.parse()?,
        provider: get(row, "provider")?,
        purpose: get::<String>(row, "purpose")?.parse()?,
        status: get::<String>(row, "status")?.parse()?,
        transaction_id: TransactionReference::new(get::<String>(row, "transaction_id")?)?,
        card_holder_name: get(row, "card_holder_name")?,
        card_last4: get(row, "card_last4")?,
        card_token: get(row, "card_token")?,
        mobile_number: get(row, "mobile_number")?,
        gateway_token: get(row, "gateway_token")?,
        redirect_url: get(row, "redirect_url")?,
        failure_reason: get(row, "failure_reason")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Flat column values of a saved instrument.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct InstrumentColumns {
    pub method_type: &'static str,
    pub card_holder_name: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,
    pub card_exp_month: Option<i32>,
    pub card_exp_year: Option<i32>,
    pub card_token: Option<String>,
    pub mobile_number: Option<String>,
    pub mobile_provider: Option<String>,
}

impl InstrumentColumns {
    pub(super) fn from_instrument(instrument: &PaymentInstrument) -> Self {
        match instrument {
            PaymentInstrument::Card(card) => Self {
                method_type: "card",
                card_holder_name: Some(card.holder_name.clone()),
                card_last4: Some(card.last4.clone()),
                card_brand: Some(card.brand.to_string()),
                card_exp_month: i32::try_from(card.exp_month).ok(),
                card_exp_year: Some(card.exp_year),
                card_token: Some(card.token.clone()),
                ..Self::default()
            },
            PaymentInstrument::MobileMoney(mobile) => Self {
                method_type: "mobile_money",
                mobile_number: Some(mobile.number.clone()),
                mobile_provider: Some(mobile.provider.to_string()),
                ..Self::default()
            },
        }
    }

    pub(super) fn into_instrument(self) -> Result<PaymentInstrument, ValidationError> {
        match self.method_type {
            "card" => {
                let missing = |field: &str| ValidationError::empty_field(field);
                Ok(PaymentInstrument::Card(CardInstrument {
                    holder_name: self.card_holder_name.unwrap_or_default(),
                    last4: self.card_last4.ok_or_else(|| missing("card_last4"))?,
                    brand: CardBrand::parse(self.card_brand.as_deref().unwrap_or_default()),
                    exp_month: self
                        .card_exp_month
                        .and_then(|m| u32::try_from(m).ok())
                        .ok_or_else(|| missing("card_exp_month"))?,
                    exp_year: self.card_exp_year.ok_or_else(|| missing("card_exp_year"))?,
                    token: self.card_token.ok_or_else(|| missing("card_token"))?,
                }))
            }
            _ => Ok(PaymentInstrument::MobileMoney(MobileMoneyInstrument {
                number: self
                    .mobile_number
                    .ok_or_else(|| ValidationError::empty_field("mobile_number"))?,
                provider: self
                    .mobile_provider
                    .ok_or_else(|| ValidationError::empty_field("mobile_provider"))?
                    .parse()?,
            })),
        }
    }
}

pub(super) fn row_to_payment_method(row: &PgRow) -> Result<SavedPaymentMethod, DomainError> {
    let method_type: String = get(row, "method_type")?;
    let columns = InstrumentColumns {
        method_type: if method_type == "card" { "card" } else { "mobile_money" },
        card_holder_name: get(row, "card_holder_name")?,
        card_last4: get(row, "card_last4")?,
        card_brand: get(row, "card_brand")?,
        card_exp_month: get(row, "card_exp_month")?,
        card_exp_year: get(row, "card_exp_year")?,
        card_token: get(row, "card_token")?,
        mobile_number: get(row, "mobile_number")?,
        mobile_provider: get(row, "mobile_provider")?,
    };
    Ok(SavedPaymentMethod {
        id: PaymentMethodId::from_uuid(get(row, "id")?),
        user_id: UserId::new(get(row, "user_id")?)?,
        instrument: columns.into_instrument()?,
        nickname: get(row, "nickname")?,
        is_default: get(row, "is_default")?,
        created_at: timestamp(row, "created_at")?,
        last_used_at: optional_timestamp(row, "last_used_at")?,
    })
}
