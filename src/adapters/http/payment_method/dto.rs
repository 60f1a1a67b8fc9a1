//! Request and response DTOs for saved payment methods.

use serde::{Deserialize, Serialize};

use crate::domain::billing::{
    CardBrand, PaymentInstrument, PaymentMethodKind, RawPaymentDetails, SavedPaymentMethod,
};
use crate::domain::foundation::{PaymentMethodId, Timestamp};

/// Body of `POST /api/payment-methods`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddPaymentMethodRequest {
    /// `card` or `mobile_money`.
    pub method_type: String,
    #[serde(flatten)]
    pub details: RawPaymentDetails,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// A saved method without its card token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodResponse {
    pub id: PaymentMethodId,
    pub method_type: PaymentMethodKind,
    pub nickname: String,
    pub is_default: bool,
    pub card_holder_name: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<CardBrand>,
    pub card_exp_month: Option<u32>,
    pub card_exp_year: Option<i32>,
    pub mobile_number: Option<String>,
    pub mobile_provider: Option<String>,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}

impl From<SavedPaymentMethod> for PaymentMethodResponse {
    fn from(method: SavedPaymentMethod) -> Self {
        let mut response = Self {
            id: method.id,
            method_type: method.kind(),
            nickname: method.nickname,
            is_default: method.is_default,
            card_holder_name: None,
            card_last4: None,
            card_brand: None,
            card_exp_month: None,
            card_exp_year: None,
            mobile_number: None,
            mobile_provider: None,
            created_at: method.created_at,
            last_used_at: method.last_used_at,
        };

        match method.instrument {
            PaymentInstrument::Card(card) => {
                response.card_holder_name = Some(card.holder_name);
                response.card_last4 = Some(card.last4);
                response.card_brand = Some(card.brand);
                response.card_exp_month = Some(card.exp_month);
                response.card_exp_year = Some(card.exp_year);
            }
            PaymentInstrument::MobileMoney(mobile) => {
                response.mobile_number = Some(mobile.number);
                response.mobile_provider = Some(mobile.provider.as_str().to_string());
            }
        }

        response
    }
}
