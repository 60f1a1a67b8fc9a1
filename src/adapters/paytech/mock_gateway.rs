//! Mock payment gateway for testing.
//!
//! Returns a deterministic hosted session per reference unless an error was
//! queued, and records every request for assertions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ports::{GatewayError, GatewayPaymentRequest, GatewaySession, PaymentGateway};

/// Mock gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.fail_next(GatewayError::rejected("insufficient funds"));
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    errors: VecDeque<GatewayError>,
    requests: Vec<GatewayPaymentRequest>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error for the next request.
    pub fn fail_next(&self, error: GatewayError) {
        self.lock().errors.push_back(error);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GatewayPaymentRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn request_payment(
        &self,
        request: &GatewayPaymentRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        if let Some(error) = state.errors.pop_front() {
            return Err(error);
        }
        let token = format!("mock_{}", request.reference);
        Ok(GatewaySession {
            redirect_url: format!("https://paytech.test/payment/checkout/{}", token),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{PaymentMethodKind, ReferencePrefix, TransactionReference};

    fn request() -> GatewayPaymentRequest {
        GatewayPaymentRequest {
            reference: TransactionReference::generate(ReferencePrefix::Subscribe),
            amount: 5000,
            item_name: "Mensuel".to_string(),
            method: PaymentMethodKind::MobileMoney,
            provider: Some("Wave".to_string()),
            phone: Some("771234567".to_string()),
        }
    }

    #[tokio::test]
    async fn returns_session_keyed_by_reference() {
        let gateway = MockPaymentGateway::new();
        let req = request();

        let session = gateway.request_payment(&req).await.unwrap();

        assert!(session.token.ends_with(req.reference.as_str()));
        assert!(session.redirect_url.contains(&session.token));
        assert_eq!(gateway.requests(), vec![req]);
    }

    #[tokio::test]
    async fn queued_error_is_returned_once() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_next(GatewayError::timeout("slow"));

        assert!(gateway.request_payment(&request()).await.unwrap_err().is_timeout());
        assert!(gateway.request_payment(&request()).await.is_ok());
        assert_eq!(gateway.request_count(), 2);
    }
}
