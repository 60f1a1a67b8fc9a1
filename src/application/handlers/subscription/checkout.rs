//! Gateway calls shared by subscribe and renew.
//!
//! Both run after the lifecycle transaction committed, so the payment row
//! already exists when the gateway sees its reference.

use crate::application::in_transaction;
use crate::domain::billing::{BillingError, Payment};
use crate::domain::foundation::PaymentId;
use crate::ports::{BillingStore, GatewayPaymentRequest, GatewaySession};

pub(super) fn payment_request(payment: &Payment, item_name: &str) -> GatewayPaymentRequest {
    GatewayPaymentRequest {
        reference: payment.transaction_id.clone(),
        amount: payment.amount,
        item_name: item_name.to_string(),
        method: payment.method,
        provider: payment.provider.clone(),
        phone: payment.mobile_number.clone(),
    }
}

/// Stores the hosted session on the payment.
pub(super) async fn record_session(
    store: &dyn BillingStore,
    payment_id: PaymentId,
    session: GatewaySession,
) -> Result<Payment, BillingError> {
    in_transaction(store, move |tx| {
        Box::pin(async move {
            let mut payment = tx.find_payment(payment_id).await?.ok_or_else(|| {
                BillingError::infrastructure(format!("Payment {} vanished", payment_id))
            })?;
            payment.attach_gateway_session(session.token, session.redirect_url);
            tx.update_payment(&payment).await?;
            Ok(payment)
        })
    })
    .await
}

/// Marks a payment the gateway refused as failed.
pub(super) async fn fail_payment(
    store: &dyn BillingStore,
    payment_id: PaymentId,
    reason: String,
) -> Result<(), BillingError> {
    in_transaction(store, move |tx| {
        Box::pin(async move {
            if let Some(mut payment) = tx.find_payment(payment_id).await? {
                payment.fail(reason)?;
                tx.update_payment(&payment).await?;
            }
            Ok(())
        })
    })
    .await
}
