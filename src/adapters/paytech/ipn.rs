//! PayTech instant payment notifications (IPN).
//!
//! The callback body is JSON carrying `ref_command`, `type_event` and
//! `payment_status`. When verification is enabled, the body must also carry
//! `api_key_sha256` / `api_secret_sha256`, the hex SHA-256 digests of the
//! merchant credentials.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::application::handlers::SettlementOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpnError {
    #[error("Malformed IPN body: {0}")]
    Malformed(String),

    #[error("IPN does not carry credential digests")]
    MissingDigests,

    #[error("IPN credential digests do not match")]
    DigestMismatch,
}

/// One decoded callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaytechIpn {
    #[serde(default)]
    pub type_event: Option<String>,
    #[serde(default)]
    pub ref_command: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub api_key_sha256: Option<String>,
    #[serde(default)]
    pub api_secret_sha256: Option<String>,
}

impl PaytechIpn {
    pub fn parse(body: &[u8]) -> Result<Self, IpnError> {
        serde_json::from_slice(body).map_err(|e| IpnError::Malformed(e.to_string()))
    }

    /// The locally generated transaction reference.
    pub fn reference(&self) -> &str {
        self.ref_command.as_deref().unwrap_or_default()
    }

    /// `sale_complete` settles the payment unless the status says otherwise;
    /// a `cancelled` status (or `sale_canceled` event) cancels it.
    pub fn outcome(&self) -> SettlementOutcome {
        let event = self.type_event.as_deref().unwrap_or_default();
        let status = self.payment_status.as_deref();
        match (event, status) {
            ("sale_complete", None | Some("success")) => SettlementOutcome::Completed,
            (_, Some("cancelled")) | ("sale_canceled", _) => SettlementOutcome::Cancelled,
            ("", Some(other)) => SettlementOutcome::Other(other.to_string()),
            (other, _) => SettlementOutcome::Other(other.to_string()),
        }
    }
}

/// Checks the credential digests PayTech echoes in every IPN.
#[derive(Clone)]
pub struct IpnVerifier {
    key_digest: [u8; 32],
    secret_digest: [u8; 32],
}

impl IpnVerifier {
    pub fn new(api_key: &SecretString, api_secret: &SecretString) -> Self {
        Self {
            key_digest: Sha256::digest(api_key.expose_secret().as_bytes()).into(),
            secret_digest: Sha256::digest(api_secret.expose_secret().as_bytes()).into(),
        }
    }

    pub fn verify(&self, ipn: &PaytechIpn) -> Result<(), IpnError> {
        let (Some(key), Some(secret)) = (&ipn.api_key_sha256, &ipn.api_secret_sha256) else {
            return Err(IpnError::MissingDigests);
        };
        let key = hex::decode(key.trim()).map_err(|_| IpnError::DigestMismatch)?;
        let secret = hex::decode(secret.trim()).map_err(|_| IpnError::DigestMismatch)?;

        let key_ok = self.key_digest.as_slice().ct_eq(&key);
        let secret_ok = self.secret_digest.as_slice().ct_eq(&secret);
        if (key_ok & secret_ok).unwrap_u8() != 1 {
            return Err(IpnError::DigestMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.to_string())
    }

    fn digest(value: &str) -> String {
        hex::encode(Sha256::digest(value.as_bytes()))
    }

    #[test]
    fn sale_complete_with_success_status_completes() {
        let ipn = PaytechIpn::parse(
            br#"{"type_event":"sale_complete","ref_command":"SUB-1-ABC","payment_status":"success"}"#,
        )
        .unwrap();

        assert_eq!(ipn.reference(), "SUB-1-ABC");
        assert_eq!(ipn.outcome(), SettlementOutcome::Completed);
    }

    #[test]
    fn sale_complete_without_status_completes() {
        let ipn = PaytechIpn {
            type_event: Some("sale_complete".to_string()),
            ..PaytechIpn::default()
        };
        assert_eq!(ipn.outcome(), SettlementOutcome::Completed);
    }

    #[test]
    fn cancelled_status_cancels() {
        let ipn = PaytechIpn {
            payment_status: Some("cancelled".to_string()),
            ..PaytechIpn::default()
        };
        assert_eq!(ipn.outcome(), SettlementOutcome::Cancelled);

        let ipn = PaytechIpn {
            type_event: Some("sale_canceled".to_string()),
            ..PaytechIpn::default()
        };
        assert_eq!(ipn.outcome(), SettlementOutcome::Cancelled);
    }

    #[test]
    fn other_events_are_passed_through() {
        let ipn = PaytechIpn {
            type_event: Some("refund_complete".to_string()),
            ..PaytechIpn::default()
        };
        assert_eq!(
            ipn.outcome(),
            SettlementOutcome::Other("refund_complete".to_string())
        );
    }

    #[test]
    fn malformed_body_is_reported() {
        assert!(matches!(
            PaytechIpn::parse(b"ref_command=SUB-1"),
            Err(IpnError::Malformed(_))
        ));
    }

    #[test]
    fn matching_digests_verify() {
        let verifier = IpnVerifier::new(&secret("key"), &secret("secret"));
        let ipn = PaytechIpn {
            api_key_sha256: Some(digest("key")),
            api_secret_sha256: Some(digest("secret")),
            ..PaytechIpn::default()
        };
        assert_eq!(verifier.verify(&ipn), Ok(()));
    }

    #[test]
    fn wrong_or_missing_digests_fail() {
        let verifier = IpnVerifier::new(&secret("key"), &secret("secret"));

        let wrong = PaytechIpn {
            api_key_sha256: Some(digest("key")),
            api_secret_sha256: Some(digest("guess")),
            ..PaytechIpn::default()
        };
        assert_eq!(verifier.verify(&wrong), Err(IpnError::DigestMismatch));

        let not_hex = PaytechIpn {
            api_key_sha256: Some("zz".to_string()),
            api_secret_sha256: Some(digest("secret")),
            ..PaytechIpn::default()
        };
        assert_eq!(verifier.verify(&not_hex), Err(IpnError::DigestMismatch));

        assert_eq!(
            verifier.verify(&PaytechIpn::default()),
            Err(IpnError::MissingDigests)
        );
    }
}
