//! Scoped transactions.
//!
//! Every multi-statement lifecycle mutation goes through [`in_transaction`]:
//! the unit of work either commits as a whole or leaves no trace.

use futures::future::BoxFuture;

use crate::domain::billing::BillingError;
use crate::ports::{BillingStore, BillingTransaction};

/// Runs `work` inside a fresh transaction.
///
/// Commits when `work` returns `Ok`, rolls back and returns the error
/// otherwise. A failed rollback is logged; the original error still wins.
/// The transaction handle is dropped on every path, which releases the
/// underlying connection.
///
/// The closure receives the transaction for the duration of the returned
/// future only, so it must own everything it captures:
///
/// ```ignore
/// let plan_id = cmd.plan_id;
/// let plan = in_transaction(&*store, move |tx| {
///     Box::pin(async move { tx.find_plan(plan_id).await.map_err(BillingError::from) })
/// })
/// .await?;
/// ```
pub async fn in_transaction<T, F>(store: &dyn BillingStore, work: F) -> Result<T, BillingError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn BillingTransaction) -> BoxFuture<'t, Result<T, BillingError>>
        + Send,
{
    let mut tx = store.begin().await?;

    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original = %err,
                    "Failed to roll back transaction"
                );
            }
            Err(err)
        }
    }
}
