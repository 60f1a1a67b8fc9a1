//! Billing domain - driver subscriptions, plans, payments and saved methods.
//!
//! The subscription lifecycle is
//! `pending_payment -> active -> {canceled, expired, superseded}`, with
//! renewals bringing an inactive subscription back to `active`. The
//! presentation phase (`expiring_soon` and friends) is derived from the stored
//! status and the calendar, never stored.

mod card_brand;
mod errors;
mod instrument;
mod payment;
mod plan;
mod saved_method;
mod status;
mod subscription;
mod tokenizer;

pub use card_brand::CardBrand;
pub use errors::BillingError;
pub use instrument::{
    CardInstrument, MobileMoneyInstrument, MobileProvider, PaymentChannel, PaymentInstrument,
    RawPaymentDetails,
};
pub use payment::{
    Payment, PaymentMethodKind, PaymentPurpose, PaymentStatus, ReferencePrefix,
    TransactionReference,
};
pub use plan::Plan;
pub use saved_method::SavedPaymentMethod;
pub use status::{LifecyclePhase, SubscriptionStatus};
pub use subscription::{RenewalHold, Subscription, EXPIRING_SOON_WINDOW_DAYS, RENEWAL_HOLD_DAYS};
pub use tokenizer::CardTokenizer;

#[cfg(test)]
pub(crate) mod test_support {
    pub(crate) use super::instrument::fixtures::*;
    pub(crate) use super::plan::fixtures::*;
    pub(crate) use super::subscription::fixtures::*;
}
