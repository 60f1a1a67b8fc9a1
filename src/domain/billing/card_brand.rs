//! Card network detection from the leading digits.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    AmericanExpress,
    Discover,
    Unknown,
}

impl CardBrand {
    /// Guesses the network from a digits-only card number.
    ///
    /// Prefix table: `4` Visa, `51`-`55` Mastercard, `34`/`37` American
    /// Express, `6011`/`65` Discover.
    pub fn detect(digits: &str) -> Self {
        let two = digits.get(..2).unwrap_or("");
        if digits.starts_with('4') {
            CardBrand::Visa
        } else if matches!(two, "51" | "52" | "53" | "54" | "55") {
            CardBrand::Mastercard
        } else if matches!(two, "34" | "37") {
            CardBrand::AmericanExpress
        } else if digits.starts_with("6011") || two == "65" {
            CardBrand::Discover
        } else {
            CardBrand::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "Visa",
            CardBrand::Mastercard => "Mastercard",
            CardBrand::AmericanExpress => "American Express",
            CardBrand::Discover => "Discover",
            CardBrand::Unknown => "Unknown",
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "Visa" => CardBrand::Visa,
            "Mastercard" => CardBrand::Mastercard,
            "American Express" => CardBrand::AmericanExpress,
            "Discover" => CardBrand::Discover,
            _ => CardBrand::Unknown,
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_network() {
        assert_eq!(CardBrand::detect("4111111111111111"), CardBrand::Visa);
        assert_eq!(CardBrand::detect("5105105105105100"), CardBrand::Mastercard);
        assert_eq!(CardBrand::detect("5555555555554444"), CardBrand::Mastercard);
        assert_eq!(CardBrand::detect("378282246310005"), CardBrand::AmericanExpress);
        assert_eq!(CardBrand::detect("341111111111111"), CardBrand::AmericanExpress);
        assert_eq!(CardBrand::detect("6011111111111117"), CardBrand::Discover);
        assert_eq!(CardBrand::detect("6500000000000002"), CardBrand::Discover);
    }

    #[test]
    fn unlisted_prefixes_are_unknown() {
        assert_eq!(CardBrand::detect("5605105105105100"), CardBrand::Unknown);
        assert_eq!(CardBrand::detect("6012000000000000"), CardBrand::Unknown);
        assert_eq!(CardBrand::detect("3530111333300000"), CardBrand::Unknown);
        assert_eq!(CardBrand::detect(""), CardBrand::Unknown);
    }

    #[test]
    fn label_round_trips() {
        for brand in [
            CardBrand::Visa,
            CardBrand::Mastercard,
            CardBrand::AmericanExpress,
            CardBrand::Discover,
            CardBrand::Unknown,
        ] {
            assert_eq!(CardBrand::parse(brand.as_str()), brand);
        }
    }
}
