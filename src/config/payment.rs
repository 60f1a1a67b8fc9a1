//! Payment gateway configuration (PayTech)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// PayTech account and callback settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub api_key: SecretString,

    pub api_secret: SecretString,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// `test` (sandbox) or `prod`
    #[serde(default = "default_gateway_environment")]
    pub environment: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Page the payer lands on after paying
    pub success_url: String,

    /// Page the payer lands on after abandoning
    pub cancel_url: String,

    /// Public URL of `POST /api/webhooks/paytech`
    pub ipn_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// HMAC key for card tokens
    pub card_token_secret: SecretString,

    /// Require the hashed API keys on incoming notifications
    #[serde(default = "default_verify_ipn")]
    pub verify_ipn: bool,
}

impl PaymentConfig {
    pub fn is_live(&self) -> bool {
        self.environment == "prod"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__API_KEY"));
        }
        if self.api_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__API_SECRET"));
        }
        if self.card_token_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__CARD_TOKEN_SECRET"));
        }
        if self.environment != "test" && self.environment != "prod" {
            return Err(ValidationError::InvalidGatewayEnvironment(
                self.environment.clone(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        let urls = [
            ("PAYMENT__API_BASE_URL", &self.api_base_url),
            ("PAYMENT__SUCCESS_URL", &self.success_url),
            ("PAYMENT__CANCEL_URL", &self.cancel_url),
            ("PAYMENT__IPN_URL", &self.ipn_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl(name));
            }
            if *environment == Environment::Production && !url.starts_with("https://") {
                return Err(ValidationError::UrlMustBeHttps(name));
            }
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://paytech.sn".to_string()
}

fn default_gateway_environment() -> String {
    "test".to_string()
}

fn default_currency() -> String {
    "XOF".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_verify_ipn() -> bool {
    true
}
