//! SMS receipt configuration (Twilio)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Twilio credentials. Receipts are only logged when all three are absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    /// Sender number in E.164 format
    pub from_number: Option<String>,
}

impl SmsConfig {
    pub fn is_enabled(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }

    /// Either all credentials are set or none.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let configured = self.account_sid.is_some()
            || self.auth_token.is_some()
            || self.from_number.is_some();
        if !configured {
            return Ok(());
        }
        if self.account_sid.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::IncompleteSms("SMS__ACCOUNT_SID"));
        }
        if self
            .auth_token
            .as_ref()
            .map_or(true, |t| t.expose_secret().is_empty())
        {
            return Err(ValidationError::IncompleteSms("SMS__AUTH_TOKEN"));
        }
        if self.from_number.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::IncompleteSms("SMS__FROM_NUMBER"));
        }
        Ok(())
    }
}
