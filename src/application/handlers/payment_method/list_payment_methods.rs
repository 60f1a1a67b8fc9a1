//! ListPaymentMethodsHandler - Query handler for the caller's saved methods.

use std::sync::Arc;

use crate::domain::billing::{BillingError, SavedPaymentMethod};
use crate::domain::foundation::{AuthenticatedUser, Role};
use crate::ports::BillingReader;

#[derive(Debug, Clone)]
pub struct ListPaymentMethodsQuery {
    pub actor: AuthenticatedUser,
}

/// Default method first, then newest first.
pub type ListPaymentMethodsResult = Vec<SavedPaymentMethod>;

pub struct ListPaymentMethodsHandler {
    reader: Arc<dyn BillingReader>,
}

impl ListPaymentMethodsHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: ListPaymentMethodsQuery,
    ) -> Result<ListPaymentMethodsResult, BillingError> {
        query.actor.require_role(Role::Driver)?;
        self.reader
            .list_payment_methods(query.actor.id)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBillingStore;
    use crate::application::handlers::test_support::*;
    use crate::domain::billing::PaymentChannel;
    use crate::domain::foundation::UserId;

    #[tokio::test]
    async fn default_method_comes_first_and_others_are_hidden() {
        let store = InMemoryBillingStore::new();
        let wave = wave_details()
            .validate(PaymentChannel::MobileMoney, today(), &tokenizer())
            .unwrap();
        let card = visa_details()
            .validate(PaymentChannel::Card, today(), &tokenizer())
            .unwrap();
        let me = UserId::new(42).unwrap();
        let default = SavedPaymentMethod::new(me, card, None, true).unwrap();
        let other = SavedPaymentMethod::new(me, wave.clone(), None, false).unwrap();
        let foreign = SavedPaymentMethod::new(UserId::new(7).unwrap(), wave, None, true).unwrap();
        store.add_payment_method(other.clone()).await;
        store.add_payment_method(default.clone()).await;
        store.add_payment_method(foreign).await;
        let handler = ListPaymentMethodsHandler::new(Arc::new(store));

        let listed = handler
            .handle(ListPaymentMethodsQuery { actor: driver(42) })
            .await
            .unwrap();

        let ids: Vec<_> = listed.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![default.id, other.id]);
    }
}
