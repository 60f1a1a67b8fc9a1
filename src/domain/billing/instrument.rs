//! Payment details supplied by a subscriber and their validated form.
//!
//! Raw details arrive as loose optional strings; `RawPaymentDetails::validate`
//! turns them into a `PaymentInstrument` that holds only what may be stored:
//! card holder, last four digits, brand, expiry and a non-reversible token,
//! or a normalised mobile-money number and operator.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

use super::{CardBrand, CardTokenizer, PaymentMethodKind};

/// Senegalese mobile numbers, with or without the country code.
static MOBILE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+221|221)?[73][0-9]{8}$").expect("valid mobile number pattern"));

/// Channel chosen by the subscriber for a new payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Card,
    MobileMoney,
}

impl FromStr for PaymentChannel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentChannel::Card),
            "mobile_money" => Ok(PaymentChannel::MobileMoney),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("'{}' is not one of card, mobile_money", other),
            )),
        }
    }
}

/// Mobile-money operators accepted for payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobileProvider {
    Wave,
    OrangeMoney,
    FreeMoney,
    Yup,
    Wizall,
}

impl MobileProvider {
    pub const ALL: [MobileProvider; 5] = [
        MobileProvider::Wave,
        MobileProvider::OrangeMoney,
        MobileProvider::FreeMoney,
        MobileProvider::Yup,
        MobileProvider::Wizall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MobileProvider::Wave => "Wave",
            MobileProvider::OrangeMoney => "Orange Money",
            MobileProvider::FreeMoney => "Free Money",
            MobileProvider::Yup => "YUP",
            MobileProvider::Wizall => "Wizall",
        }
    }
}

impl fmt::Display for MobileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MobileProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MobileProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let allowed: Vec<_> = MobileProvider::ALL.iter().map(|p| p.as_str()).collect();
                ValidationError::invalid_format(
                    "mobile_provider",
                    format!("'{}' is not one of {}", wanted, allowed.join(", ")),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInstrument {
    pub holder_name: String,
    pub last4: String,
    pub brand: CardBrand,
    pub exp_month: u32,
    pub exp_year: i32,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileMoneyInstrument {
    /// Number with whitespace removed.
    pub number: String,
    pub provider: MobileProvider,
}

/// Validated, storable payment instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentInstrument {
    Card(CardInstrument),
    MobileMoney(MobileMoneyInstrument),
}

impl PaymentInstrument {
    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            PaymentInstrument::Card(_) => PaymentMethodKind::Card,
            PaymentInstrument::MobileMoney(_) => PaymentMethodKind::MobileMoney,
        }
    }

    /// Label used when a saved method has no nickname.
    pub fn default_nickname(&self) -> String {
        match self {
            PaymentInstrument::Card(card) => format!("{} ****{}", card.brand, card.last4),
            PaymentInstrument::MobileMoney(mobile) => {
                format!("{} {}", mobile.provider, mobile.number)
            }
        }
    }

    /// Cards past their expiry month can no longer fund a payment.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self {
            PaymentInstrument::Card(card) => {
                (card.exp_year, card.exp_month) < (today.year(), today.month())
            }
            PaymentInstrument::MobileMoney(_) => false,
        }
    }

    /// Phone number the gateway and receipts should use, if any.
    pub fn mobile_number(&self) -> Option<&str> {
        match self {
            PaymentInstrument::MobileMoney(mobile) => Some(&mobile.number),
            PaymentInstrument::Card(_) => None,
        }
    }
}

/// Payment fields exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPaymentDetails {
    pub card_holder_name: Option<String>,
    pub card_number: Option<String>,
    pub card_cvv: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub card_exp_month: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub card_exp_year: Option<String>,
    pub mobile_number: Option<String>,
    pub mobile_provider: Option<String>,
}

/// Expiry fields arrive as `"12"` from some clients and `12` from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        StringOrNumber::String(text) => text,
        StringOrNumber::Integer(number) => number.to_string(),
    }))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

impl RawPaymentDetails {
    /// Validates the fields required by `channel`.
    ///
    /// Missing fields are reported together before any format check runs.
    pub fn validate(
        &self,
        channel: PaymentChannel,
        today: NaiveDate,
        tokenizer: &CardTokenizer,
    ) -> Result<PaymentInstrument, ValidationError> {
        match channel {
            PaymentChannel::Card => self.validate_card(today, tokenizer),
            PaymentChannel::MobileMoney => self.validate_mobile(),
        }
    }

    fn validate_card(
        &self,
        today: NaiveDate,
        tokenizer: &CardTokenizer,
    ) -> Result<PaymentInstrument, ValidationError> {
        let fields = [
            ("card_holder_name", present(&self.card_holder_name)),
            ("card_number", present(&self.card_number)),
            ("card_cvv", present(&self.card_cvv)),
            ("card_exp_month", present(&self.card_exp_month)),
            ("card_exp_year", present(&self.card_exp_year)),
        ];
        let missing: Vec<_> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        let [(_, Some(holder)), (_, Some(number)), (_, Some(cvv)), (_, Some(month)), (_, Some(year))] =
            fields
        else {
            return Err(ValidationError::missing_fields(missing));
        };

        let digits = strip_whitespace(number);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "card_number",
                "must contain digits only",
            ));
        }
        if !(13..=19).contains(&digits.len()) {
            return Err(ValidationError::out_of_range(
                "card_number",
                13,
                19,
                digits.len() as i64,
            ));
        }

        if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "card_cvv",
                "must be 3 or 4 digits",
            ));
        }

        let exp_month: u32 = month
            .parse()
            .map_err(|_| ValidationError::invalid_format("card_exp_month", "not a number"))?;
        if !(1..=12).contains(&exp_month) {
            return Err(ValidationError::out_of_range(
                "card_exp_month",
                1,
                12,
                i64::from(exp_month),
            ));
        }
        let mut exp_year: i32 = year
            .parse()
            .map_err(|_| ValidationError::invalid_format("card_exp_year", "not a number"))?;
        if exp_year < 100 {
            exp_year += 2000;
        }
        if (exp_year, exp_month) < (today.year(), today.month()) {
            return Err(ValidationError::invalid_format(
                "card_exp_year",
                "card has expired",
            ));
        }

        Ok(PaymentInstrument::Card(CardInstrument {
            holder_name: holder.to_string(),
            last4: digits[digits.len() - 4..].to_string(),
            brand: CardBrand::detect(&digits),
            exp_month,
            exp_year,
            token: tokenizer.tokenize(&digits),
        }))
    }

    fn validate_mobile(&self) -> Result<PaymentInstrument, ValidationError> {
        let number = present(&self.mobile_number);
        let provider = present(&self.mobile_provider);
        let (Some(number), Some(provider)) = (number, provider) else {
            let mut missing = Vec::new();
            if number.is_none() {
                missing.push("mobile_number");
            }
            if provider.is_none() {
                missing.push("mobile_provider");
            }
            return Err(ValidationError::missing_fields(missing));
        };

        let number = strip_whitespace(number);
        if !MOBILE_NUMBER.is_match(&number) {
            return Err(ValidationError::invalid_format(
                "mobile_number",
                "expected a Senegalese number such as 77 123 45 67",
            ));
        }
        let provider: MobileProvider = provider.parse()?;

        Ok(PaymentInstrument::MobileMoney(MobileMoneyInstrument { number, provider }))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    // ════════════════════════════════════════════════════════════════
    // Card
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn valid_card_keeps_only_last_four_and_token() {
        let instrument = visa_details()
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap();

        let PaymentInstrument::Card(card) = instrument else {
            panic!("expected card");
        };
        assert_eq!(card.last4, "1111");
        assert_eq!(card.brand, CardBrand::Visa);
        assert_eq!(card.exp_month, 12);
        assert_eq!(card.exp_year, 2030);
        assert!(card.token.starts_with("tok_"));
        assert!(!card.token.contains("4111"));
    }

    #[test]
    fn missing_card_fields_are_all_listed() {
        let details = RawPaymentDetails {
            card_holder_name: Some("Awa".to_string()),
            card_number: Some("   ".to_string()),
            ..Default::default()
        };
        let err = details
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap_err();
        assert_eq!(
            err.missing(),
            &["card_number", "card_cvv", "card_exp_month", "card_exp_year"]
        );
    }

    #[test]
    fn ten_digit_card_is_out_of_range() {
        let details = RawPaymentDetails {
            card_number: Some("4111111111".to_string()),
            ..visa_details()
        };
        let err = details
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { actual: 10, .. }));
    }

    #[test]
    fn non_digit_card_number_is_rejected() {
        let details = RawPaymentDetails {
            card_number: Some("4111-1111-1111-1111".to_string()),
            ..visa_details()
        };
        assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_err());
    }

    #[test]
    fn cvv_must_be_three_or_four_digits() {
        for cvv in ["12", "12345", "12a"] {
            let details = RawPaymentDetails {
                card_cvv: Some(cvv.to_string()),
                ..visa_details()
            };
            assert!(
                details.validate(PaymentChannel::Card, today(), &tokenizer()).is_err(),
                "cvv {} should fail",
                cvv
            );
        }
    }

    #[test]
    fn card_expiring_this_month_is_accepted() {
        let details = RawPaymentDetails {
            card_exp_month: Some("6".to_string()),
            card_exp_year: Some("2026".to_string()),
            ..visa_details()
        };
        assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_ok());
    }

    #[test]
    fn card_expired_last_month_is_rejected() {
        let details = RawPaymentDetails {
            card_exp_month: Some("5".to_string()),
            card_exp_year: Some("2026".to_string()),
            ..visa_details()
        };
        assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_err());
    }

    #[test]
    fn two_digit_year_is_read_as_this_century() {
        let details = RawPaymentDetails {
            card_exp_year: Some("29".to_string()),
            ..visa_details()
        };
        let instrument = details
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap();
        assert!(matches!(instrument, PaymentInstrument::Card(ref c) if c.exp_year == 2029));
    }

    #[test]
    fn month_thirteen_is_rejected() {
        let details = RawPaymentDetails {
            card_exp_month: Some("13".to_string()),
            ..visa_details()
        };
        assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_err());
    }

    // ════════════════════════════════════════════════════════════════
    // Mobile money
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn valid_wave_number_is_accepted() {
        let instrument = wave_details()
            .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
            .unwrap();
        assert_eq!(
            instrument,
            PaymentInstrument::MobileMoney(MobileMoneyInstrument {
                number: "771234567".to_string(),
                provider: MobileProvider::Wave,
            })
        );
        assert_eq!(instrument.mobile_number(), Some("771234567"));
    }

    #[test]
    fn country_code_and_spaces_are_accepted() {
        for number in ["+221 77 123 45 67", "221771234567", "70 000 00 00", "33 123 45 67"] {
            let details = RawPaymentDetails {
                mobile_number: Some(number.to_string()),
                ..wave_details()
            };
            assert!(
                details.validate(PaymentChannel::MobileMoney, today(), &tokenizer()).is_ok(),
                "{} should be accepted",
                number
            );
        }
    }

    #[test]
    fn foreign_or_short_numbers_are_rejected() {
        for number in ["671234567", "77123456", "+33612345678", "7712345678"] {
            let details = RawPaymentDetails {
                mobile_number: Some(number.to_string()),
                ..wave_details()
            };
            assert!(
                details.validate(PaymentChannel::MobileMoney, today(), &tokenizer()).is_err(),
                "{} should be rejected",
                number
            );
        }
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let details = RawPaymentDetails {
            mobile_provider: Some("PayPal".to_string()),
            ..wave_details()
        };
        let err = details
            .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
            .unwrap_err();
        assert!(err.to_string().contains("Orange Money"));
    }

    #[test]
    fn missing_mobile_fields_are_listed() {
        let err = RawPaymentDetails::default()
            .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
            .unwrap_err();
        assert_eq!(err.missing(), &["mobile_number", "mobile_provider"]);
    }

    #[test]
    fn operator_names_match_case_insensitively() {
        assert_eq!("orange money".parse::<MobileProvider>().unwrap(), MobileProvider::OrangeMoney);
        assert_eq!("YUP".parse::<MobileProvider>().unwrap(), MobileProvider::Yup);
    }

    #[test]
    fn default_nicknames() {
        let card = visa_details()
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap();
        assert_eq!(card.default_nickname(), "Visa ****1111");
        let mobile = wave_details()
            .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
            .unwrap();
        assert_eq!(mobile.default_nickname(), "Wave 771234567");
    }

    #[test]
    fn card_expiry_is_checked_against_a_later_day() {
        let card = visa_details()
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap();
        assert!(!card.is_expired(today()));
        assert!(card.is_expired(NaiveDate::from_ymd_opt(2031, 1, 1).unwrap()));
    }

    #[test]
    fn numeric_expiry_reads_as_text() {
        let details: RawPaymentDetails = serde_json::from_value(serde_json::json!({
            "card_exp_month": 12,
            "card_exp_year": "2030"
        }))
        .unwrap();
        assert_eq!(details.card_exp_month.as_deref(), Some("12"));
        assert_eq!(details.card_exp_year.as_deref(), Some("2030"));

        let empty: RawPaymentDetails = serde_json::from_value(serde_json::json!({
            "card_exp_month": null
        }))
        .unwrap();
        assert_eq!(empty.card_exp_month, None);
        assert_eq!(empty.card_exp_year, None);
    }

    proptest! {
        #[test]
        fn card_numbers_outside_13_to_19_digits_never_validate(len in 1usize..40) {
            prop_assume!(!(13..=19).contains(&len));
            let details = RawPaymentDetails {
                card_number: Some("4".repeat(len)),
                ..visa_details()
            };
            prop_assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_err());
        }

        #[test]
        fn card_numbers_within_range_validate(len in 13usize..=19) {
            let details = RawPaymentDetails {
                card_number: Some("4".repeat(len)),
                ..visa_details()
            };
            prop_assert!(details.validate(PaymentChannel::Card, today(), &tokenizer()).is_ok());
        }

        #[test]
        fn nine_digit_numbers_starting_with_7_or_3_validate(first in prop::sample::select(vec!['7', '3']), rest in "[0-9]{8}") {
            let details = RawPaymentDetails {
                mobile_number: Some(format!("{}{}", first, rest)),
                ..wave_details()
            };
            prop_assert!(details.validate(PaymentChannel::MobileMoney, today(), &tokenizer()).is_ok());
        }
    }
}
