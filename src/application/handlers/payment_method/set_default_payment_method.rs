//! SetDefaultPaymentMethodHandler - Command handler for choosing the default method.

use std::sync::Arc;

use crate::application::in_transaction;
use crate::domain::billing::{BillingError, SavedPaymentMethod};
use crate::domain::foundation::{AuthenticatedUser, PaymentMethodId, Role};
use crate::ports::BillingStore;

#[derive(Debug, Clone)]
pub struct SetDefaultPaymentMethodCommand {
    pub actor: AuthenticatedUser,
    pub payment_method_id: PaymentMethodId,
}

pub type SetDefaultPaymentMethodResult = SavedPaymentMethod;

/// Makes one saved method the default; the previous default loses the flag.
pub struct SetDefaultPaymentMethodHandler {
    store: Arc<dyn BillingStore>,
}

impl SetDefaultPaymentMethodHandler {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        cmd: SetDefaultPaymentMethodCommand,
    ) -> Result<SetDefaultPaymentMethodResult, BillingError> {
        cmd.actor.require_role(Role::Driver)?;
        let (user_id, id) = (cmd.actor.id, cmd.payment_method_id);

        in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let mut method = tx
                    .find_payment_method(id)
                    .await?
                    .filter(|m| m.is_owned_by(user_id))
                    .ok_or(BillingError::PaymentMethodNotFound(id))?;
                tx.clear_default_payment_method(user_id).await?;
                method.is_default = true;
                tx.update_payment_method(&method).await?;
                Ok(method)
            })
        })
        .await
    }
}
