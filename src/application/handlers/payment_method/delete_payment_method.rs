//! DeletePaymentMethodHandler - Command handler for removing a saved method.

use std::sync::Arc;

use crate::application::in_transaction;
use crate::domain::billing::BillingError;
use crate::domain::foundation::{AuthenticatedUser, PaymentMethodId, Role};
use crate::ports::BillingStore;

#[derive(Debug, Clone)]
pub struct DeletePaymentMethodCommand {
    pub actor: AuthenticatedUser,
    pub payment_method_id: PaymentMethodId,
}

pub struct DeletePaymentMethodHandler {
    store: Arc<dyn BillingStore>,
}

impl DeletePaymentMethodHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: DeletePaymentMethodCommand) -> Result<(), BillingError> {
        cmd.actor.require_role(Role::Driver)?;
        let (user_id, id) = (cmd.actor.id, cmd.payment_method_id);

        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                tx.find_payment_method(id)
                    .await?
                    .filter(|m| m.is_owned_by(user_id))
                    .ok_or(BillingError::PaymentMethodNotFound(id))?;
                if !tx.delete_payment_method(id).await? {
                    return Err(BillingError::PaymentMethodNotFound(id));
                }
                Ok(())
            })
        })
        .await?;

        tracing::info!(user_id = %user_id, payment_method_id = %id, "Payment method deleted");
        Ok(())
    }
}
