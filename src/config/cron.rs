//! Scheduler trigger configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

const MIN_SECRET_LEN: usize = 16;

/// Shared secret the scheduler presents as a bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    pub secret: SecretString,
}

impl CronConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("CRON__SECRET"));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(ValidationError::WeakCronSecret);
        }
        Ok(())
    }
}
