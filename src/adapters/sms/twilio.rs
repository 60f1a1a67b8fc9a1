//! Twilio SMS adapter.
//!
//! Sends receipts through the Twilio Messages API using basic auth with the
//! account SID and auth token.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::ports::{MessageError, MessageSender};

/// Twilio API configuration.
#[derive(Clone)]
pub struct TwilioConfig {
    account_sid: String,
    auth_token: SecretString,
    /// Sender number in E.164 format.
    from_number: String,
    api_base_url: String,
    timeout: Duration,
}

impl TwilioConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: SecretString,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token,
            from_number: from_number.into(),
            api_base_url: "https://api.twilio.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

pub struct TwilioMessageSender {
    config: TwilioConfig,
    http_client: reqwest::Client,
}

impl TwilioMessageSender {
    pub fn new(config: TwilioConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }
}

/// Normalizes a national or international number to E.164.
///
/// Senegalese numbers are stored without a country code (`771234567`) or with
/// `221`/`+221` in front.
pub fn to_e164(number: &str) -> Result<String, MessageError> {
    let compact: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.trim_start_matches('+');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(MessageError::InvalidDestination(number.to_string()));
    }
    if compact.starts_with('+') {
        return Ok(compact);
    }
    if digits.len() == 12 && digits.starts_with("221") {
        return Ok(format!("+{}", digits));
    }
    if digits.len() == 9 {
        return Ok(format!("+221{}", digits));
    }
    Err(MessageError::InvalidDestination(number.to_string()))
}

#[async_trait]
impl MessageSender for TwilioMessageSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessageError> {
        let to = to_e164(to)?;
        let params = [
            ("To", to.as_str()),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .http_client
            .post(self.config.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&params)
            .send()
            .await
            .map_err(|e| MessageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Twilio send failed");
            return Err(MessageError::Provider(error_text));
        }

        Ok(())
    }
}
