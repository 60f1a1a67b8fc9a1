//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `SHUTTLE` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use shuttle_subscriptions::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod cron;
mod database;
mod error;
mod payment;
mod server;
mod sms;

pub use auth::AuthConfig;
pub use cron::CronConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};
pub use sms::SmsConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address, environment, logging
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection pool
    pub database: DatabaseConfig,

    /// Bearer token verification
    pub auth: AuthConfig,

    /// PayTech gateway
    pub payment: PaymentConfig,

    /// Sweep trigger secret
    pub cron: CronConfig,

    /// Receipt SMS, optional
    #[serde(default)]
    pub sms: SmsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `SHUTTLE__*` variables:
    ///
    /// - `SHUTTLE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SHUTTLE__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SHUTTLE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.payment.validate(&self.server.environment)?;
        self.cron.validate()?;
        self.sms.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; tests touching them run one at a time.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL_ENV: [(&str, &str); 9] = [
        ("SHUTTLE__DATABASE__URL", "postgresql://test@localhost/shuttle"),
        ("SHUTTLE__AUTH__JWT_SECRET", "dev-jwt-secret"),
        ("SHUTTLE__PAYMENT__API_KEY", "pk_test"),
        ("SHUTTLE__PAYMENT__API_SECRET", "sk_test"),
        ("SHUTTLE__PAYMENT__SUCCESS_URL", "http://localhost:3000/payment/success"),
        ("SHUTTLE__PAYMENT__CANCEL_URL", "http://localhost:3000/payment/cancel"),
        ("SHUTTLE__PAYMENT__IPN_URL", "http://localhost:8080/api/webhooks/paytech"),
        ("SHUTTLE__PAYMENT__CARD_TOKEN_SECRET", "card-token-key"),
        ("SHUTTLE__CRON__SECRET", "cron-secret-0123456789"),
    ];

    const OPTIONAL_ENV: [&str; 3] = [
        "SHUTTLE__SERVER__PORT",
        "SHUTTLE__SERVER__ENVIRONMENT",
        "SHUTTLE__SMS__ACCOUNT_SID",
    ];

    fn set_minimal_env() {
        for (key, value) in MINIMAL_ENV {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in MINIMAL_ENV {
            env::remove_var(key);
        }
        for key in OPTIONAL_ENV {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/shuttle");
        assert_eq!(config.auth.jwt_secret.expose_secret(), "dev-jwt-secret");
        assert_eq!(config.payment.currency, "XOF");
        assert_eq!(config.payment.environment, "test");
        assert!(config.payment.verify_ipn);
        assert!(!config.sms.is_enabled());
    }

    #[test]
    fn test_validate_minimal_config() {
        let config = load_with(&[]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_overrides() {
        let config = load_with(&[
            ("SHUTTLE__SERVER__PORT", "3000"),
            ("SHUTTLE__SERVER__ENVIRONMENT", "production"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        // Short JWT secret and plain-http callbacks are refused in production.
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_sms_config_fails_validation() {
        let config = load_with(&[("SHUTTLE__SMS__ACCOUNT_SID", "AC123")]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::IncompleteSms(_))
        ));
    }
}
