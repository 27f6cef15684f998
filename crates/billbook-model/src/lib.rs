#![forbid(unsafe_code)]
//! Billbook model SSOT.
//!
//! Every entity the ledger persists is defined here, along with the typed
//! identifiers and the `Period` calendar unit the recurring-bill engine
//! keys its idempotence on.

mod alert;
mod bill;
mod ids;
mod notification;
mod period;
mod recurring;
mod utility;

pub use alert::{
    Alert, AlertConfig, AlertDraft, AlertKind, AlertPatch, Comparison, DEFAULT_PROMOTION_LEAD_DAYS,
};
pub use bill::{
    validate_amount, Bill, BillDraft, BillFilter, BillOrigin, BillPage, BillPatch, PaymentStatus,
};
pub use ids::{AlertId, BillId, NotificationId, RecurringBillId, UserId, UtilityTypeId, USER_ID_MAX_LEN};
pub use notification::{
    InboxFilter, InboxPage, Notification, NotificationDraft, NotificationKind,
};
pub use period::Period;
pub use recurring::{
    validate_day_of_month, DueTemplate, RecurringBill, RecurringBillDraft, RecurringBillPatch,
    DAY_OF_MONTH_MAX,
};
pub use utility::{UtilityType, UtilityTypeDraft, UtilityTypePatch, NAME_MAX_LEN};

pub const CRATE_NAME: &str = "billbook-model";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}
