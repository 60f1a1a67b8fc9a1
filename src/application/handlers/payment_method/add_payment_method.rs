//! AddPaymentMethodHandler - Command handler for saving a payment method.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::application::in_transaction;
use crate::domain::billing::{
    BillingError, CardTokenizer, PaymentChannel, RawPaymentDetails, SavedPaymentMethod,
};
use crate::domain::foundation::{AuthenticatedUser, Role};
use crate::ports::BillingStore;

#[derive(Debug, Clone)]
pub struct AddPaymentMethodCommand {
    pub actor: AuthenticatedUser,
    pub channel: PaymentChannel,
    pub details: RawPaymentDetails,
    pub nickname: Option<String>,
    pub is_default: bool,
    pub today: NaiveDate,
}

pub type AddPaymentMethodResult = SavedPaymentMethod;

/// Handler for saving a tokenized payment method.
///
/// Only the card's last four digits and an irreversible token are kept. The
/// first method a user saves becomes their default.
pub struct AddPaymentMethodHandler {
    store: Arc<dyn BillingStore>,
    tokenizer: Arc<CardTokenizer>,
}

impl AddPaymentMethodHandler {
    pub fn new(store: Arc<dyn BillingStore>, tokenizer: Arc<CardTokenizer>) -> Self {
        Self { store, tokenizer }
    }

    pub async fn handle(
        &self,
        cmd: AddPaymentMethodCommand,
    ) -> Result<AddPaymentMethodResult, BillingError> {
        cmd.actor.require_role(Role::Driver)?;

        let instrument = cmd.details.validate(cmd.channel, cmd.today, &self.tokenizer)?;
        let user_id = cmd.actor.id;
        let (nickname, requested_default) = (cmd.nickname, cmd.is_default);

        let method = in_transaction(&*self.store, move |tx| {
            Box::pin(async move {
                let is_default =
                    requested_default || tx.count_payment_methods(user_id).await? == 0;
                let method = SavedPaymentMethod::new(user_id, instrument, nickname, is_default)?;
                if is_default {
                    tx.clear_default_payment_method(user_id).await?;
                }
                tx.insert_payment_method(&method).await?;
                Ok(method)
            })
        })
        .await?;

        tracing::info!(
            user_id = %method.user_id,
            payment_method_id = %method.id,
            kind = method.kind().as_str(),
            "Payment method saved"
        );
        Ok(method)
    }
}
