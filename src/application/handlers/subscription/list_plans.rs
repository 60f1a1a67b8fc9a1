//! ListPlansHandler - Query handler for the plans a caller may buy.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Plan};
use crate::domain::foundation::Role;
use crate::ports::BillingReader;

#[derive(Debug, Clone)]
pub struct ListPlansQuery {
    pub role: Role,
}

/// Active plans for the role, cheapest first.
pub type ListPlansResult = Vec<Plan>;

pub struct ListPlansHandler {
    reader: Arc<dyn BillingReader>,
}

impl ListPlansHandler {
    pub fn new(reader: Arc<dyn BillingReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(&self, query: ListPlansQuery) -> Result<ListPlansResult, BillingError> {
        self.reader
            .list_plans(query.role)
            .await
            .map_err(|e| BillingError::infrastructure(e.to_string()))
    }
}
