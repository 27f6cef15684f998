// SPDX-License-Identifier: Apache-2.0

use billbook_model::{BillId, Period, RecurringBillId, UserId};
use billbook_store::{LedgerError, LedgerErrorCode, LedgerStore};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedBill {
    pub recurring_id: RecurringBillId,
    pub bill_id: BillId,
    pub utility_type_name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializeOutcome {
    /// Number of bills created by this call. A rerun in the same period
    /// reports zero.
    pub processed: usize,
    pub created_bills: Vec<CreatedBill>,
    pub current_month: Period,
}

/// Generate bills from the user's recurring templates, as of `as_of`.
///
/// A template is due when it is active, its `day_of_month` has been reached
/// in the `as_of` month, and it has not yet generated a bill for that
/// month. Each materialization advances the template's `last_generated`
/// marker and inserts the bill in one store transaction, so calling this
/// any number of times within a period creates each bill exactly once.
///
/// A template whose utility type has been deleted out from under it is
/// skipped with a warning; it does not fail the batch.
pub async fn materialize_due_bills(
    store: &dyn LedgerStore,
    user: &UserId,
    as_of: NaiveDate,
    now: DateTime<Utc>,
) -> Result<MaterializeOutcome, LedgerError> {
    let period = Period::of(as_of);
    let due = store.due_templates(user, period, as_of.day()).await?;
    debug!(user = %user, period = %period, due = due.len(), "materializing recurring bills");

    let mut created_bills = Vec::new();
    for template in due {
        let id = template.recurring.id;
        match store.materialize_template(user, id, period, now).await {
            Ok(Some(bill)) => created_bills.push(CreatedBill {
                recurring_id: id,
                bill_id: bill.id,
                utility_type_name: template.utility_type_name,
                amount: bill.amount,
            }),
            // Lost the compare-and-set: a concurrent call got there first.
            Ok(None) => {
                debug!(user = %user, recurring_id = %id, "already generated for {period}");
            }
            Err(e) if e.code == LedgerErrorCode::Dependency => {
                warn!(user = %user, recurring_id = %id, error = %e, "skipping template");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(MaterializeOutcome {
        processed: created_bills.len(),
        created_bills,
        current_month: period,
    })
}
