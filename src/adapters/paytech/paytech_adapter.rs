//! PayTech payment gateway adapter.
//!
//! Opens hosted payment sessions through `POST /api/payment/request-payment`.
//! Credentials travel in the `API_KEY` / `API_SECRET` headers. Settlement is
//! reported later through the IPN callback (see `ipn`).
//!
//! # Configuration
//!
//! ```ignore
//! let config = PaytechConfig::new(api_key, api_secret, "https://api.example.sn/ipn")
//!     .with_environment(PaytechEnvironment::Prod);
//! let gateway = PaytechGateway::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ports::{GatewayError, GatewayPaymentRequest, GatewaySession, PaymentGateway};

const DEFAULT_BASE_URL: &str = "https://paytech.sn";

/// Sandbox or live account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaytechEnvironment {
    Test,
    Prod,
}

impl PaytechEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaytechEnvironment::Test => "test",
            PaytechEnvironment::Prod => "prod",
        }
    }
}

/// PayTech API configuration.
#[derive(Clone)]
pub struct PaytechConfig {
    api_key: SecretString,
    api_secret: SecretString,
    api_base_url: String,
    environment: PaytechEnvironment,
    currency: String,
    ipn_url: String,
    success_url: String,
    cancel_url: String,
    timeout: Duration,
}

impl PaytechConfig {
    pub fn new(api_key: SecretString, api_secret: SecretString, ipn_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_secret,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            environment: PaytechEnvironment::Test,
            currency: "XOF".to_string(),
            ipn_url: ipn_url.into(),
            success_url: String::new(),
            cancel_url: String::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_environment(mut self, environment: PaytechEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Pages the payer is sent back to after paying or abandoning.
    pub fn with_return_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}/api/payment/request-payment",
            self.api_base_url.trim_end_matches('/')
        )
    }
}

/// Request body understood by PayTech.
#[derive(Debug, Serialize)]
struct PaymentRequestBody<'a> {
    item_name: &'a str,
    item_price: i64,
    currency: &'a str,
    ref_command: &'a str,
    command_name: String,
    env: &'static str,
    ipn_url: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_payment: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

/// Response body; `success` is `1` on success and `0`/`-1` otherwise.
#[derive(Debug, Default, Deserialize)]
struct PaymentResponseBody {
    #[serde(default)]
    success: serde_json::Value,
    token: Option<String>,
    #[serde(alias = "redirectUrl")]
    redirect_url: Option<String>,
    message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl PaymentResponseBody {
    fn is_success(&self) -> bool {
        self.success == serde_json::json!(1) || self.success == serde_json::json!(true)
    }

    fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        if !self.errors.is_empty() {
            return self.errors.join("; ");
        }
        "Payment request refused".to_string()
    }
}

/// Turns a decoded response into a session or a rejection.
fn interpret_response(
    http_success: bool,
    body: PaymentResponseBody,
) -> Result<GatewaySession, GatewayError> {
    if !http_success || !body.is_success() {
        return Err(GatewayError::rejected(body.failure_message()));
    }
    match (body.token, body.redirect_url) {
        (Some(token), Some(redirect_url)) if !token.is_empty() && !redirect_url.is_empty() => {
            Ok(GatewaySession {
                token,
                redirect_url,
            })
        }
        _ => Err(GatewayError::invalid_response(
            "Response is missing token or redirect_url",
        )),
    }
}

/// PayTech payment gateway adapter.
pub struct PaytechGateway {
    config: PaytechConfig,
    http_client: reqwest::Client,
}

impl PaytechGateway {
    pub fn new(config: PaytechConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            http_client,
        }
    }

    fn body<'a>(&'a self, request: &'a GatewayPaymentRequest) -> PaymentRequestBody<'a> {
        PaymentRequestBody {
            item_name: &request.item_name,
            item_price: request.amount,
            currency: &self.config.currency,
            ref_command: request.reference.as_str(),
            command_name: format!("{} ({})", request.item_name, request.reference),
            env: self.config.environment.as_str(),
            ipn_url: &self.config.ipn_url,
            success_url: &self.config.success_url,
            cancel_url: &self.config.cancel_url,
            target_payment: request.provider.as_deref(),
            phone: request.phone.as_deref(),
        }
    }
}

#[async_trait]
impl PaymentGateway for PaytechGateway {
    async fn request_payment(
        &self,
        request: &GatewayPaymentRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let response = self
            .http_client
            .post(self.config.request_url())
            .header("API_KEY", self.config.api_key.expose_secret())
            .header("API_SECRET", self.config.api_secret.expose_secret())
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!(
                        transaction_id = %request.reference,
                        "PayTech request timed out"
                    );
                    GatewayError::timeout(e.to_string())
                } else {
                    GatewayError::network(e.to_string())
                }
            })?;

        let http_success = response.status().is_success();
        let status = response.status();
        let body: PaymentResponseBody = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::timeout(e.to_string())
            } else {
                GatewayError::invalid_response(format!(
                    "Failed to parse PayTech response ({}): {}",
                    status, e
                ))
            }
        })?;

        let session = interpret_response(http_success, body);
        match &session {
            Ok(_) => tracing::info!(
                transaction_id = %request.reference,
                amount = request.amount,
                "PayTech payment session opened"
            ),
            Err(e) => tracing::error!(
                transaction_id = %request.reference,
                http_status = %status,
                error = %e,
                "PayTech refused payment request"
            ),
        }
        session
    }
}
