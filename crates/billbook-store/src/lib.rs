#![forbid(unsafe_code)]
//! Ledger store for billbook.
//!
//! The [`LedgerStore`] trait is the seam between the engine and durable
//! storage. Every per-row state transition the engine depends on
//! (`last_generated` advance, `last_triggered` stamp plus its notification
//! insert) is a single store operation executed in one transaction, so a
//! retried or concurrent call observes either both effects or neither.

mod error;
mod rows;
mod schema;
mod sqlite;

#[cfg(test)]
mod sqlite_tests;

pub use error::{LedgerError, LedgerErrorCode};
pub use schema::{apply_schema, SCHEMA_VERSION};
pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use billbook_model::{
    Alert, AlertDraft, AlertId, AlertPatch, Bill, BillDraft, BillFilter, BillId, BillPage,
    BillPatch, DueTemplate, InboxFilter, InboxPage, Notification, NotificationDraft,
    NotificationId, Period,
    RecurringBill, RecurringBillDraft, RecurringBillId, RecurringBillPatch, UserId, UtilityType,
    UtilityTypeDraft, UtilityTypeId, UtilityTypePatch,
};
use chrono::{DateTime, Utc};

pub const CRATE_NAME: &str = "billbook-store";

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Cheap liveness probe (`SELECT 1`).
    async fn ping(&self) -> Result<(), LedgerError>;

    // Utility types. Visibility: a user sees system types plus their own.
    async fn list_utility_types(&self, user: &UserId) -> Result<Vec<UtilityType>, LedgerError>;
    async fn get_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
    ) -> Result<UtilityType, LedgerError>;
    async fn create_utility_type(
        &self,
        user: &UserId,
        draft: &UtilityTypeDraft,
        now: DateTime<Utc>,
    ) -> Result<UtilityType, LedgerError>;
    async fn update_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
        patch: &UtilityTypePatch,
    ) -> Result<UtilityType, LedgerError>;
    /// Fails with `Conflict` while bills reference the type.
    async fn delete_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
    ) -> Result<(), LedgerError>;

    // Bills.
    async fn list_bills(&self, user: &UserId, filter: &BillFilter)
        -> Result<BillPage, LedgerError>;
    async fn get_bill(&self, user: &UserId, id: BillId) -> Result<Bill, LedgerError>;
    async fn insert_bill(
        &self,
        user: &UserId,
        draft: &BillDraft,
        now: DateTime<Utc>,
    ) -> Result<Bill, LedgerError>;
    async fn update_bill(
        &self,
        user: &UserId,
        id: BillId,
        patch: &BillPatch,
    ) -> Result<Bill, LedgerError>;
    async fn delete_bill(&self, user: &UserId, id: BillId) -> Result<(), LedgerError>;

    // Recurring bill templates.
    async fn list_recurring(&self, user: &UserId) -> Result<Vec<RecurringBill>, LedgerError>;
    async fn create_recurring(
        &self,
        user: &UserId,
        draft: &RecurringBillDraft,
        now: DateTime<Utc>,
    ) -> Result<RecurringBill, LedgerError>;
    async fn update_recurring(
        &self,
        user: &UserId,
        id: RecurringBillId,
        patch: &RecurringBillPatch,
    ) -> Result<RecurringBill, LedgerError>;
    async fn delete_recurring(&self, user: &UserId, id: RecurringBillId)
        -> Result<(), LedgerError>;
    /// Templates due for `period`: active, not yet generated for `period`,
    /// with `day_of_month <= day_of_month` of the as-of date.
    async fn due_templates(
        &self,
        user: &UserId,
        period: Period,
        day_of_month: u32,
    ) -> Result<Vec<DueTemplate>, LedgerError>;
    /// Compare-and-set advance of `last_generated` to `period`, coupled
    /// with the bill insert in one transaction. `Ok(None)` means a
    /// concurrent or earlier call already generated for `period`.
    /// `Dependency` means the template's utility type no longer exists;
    /// nothing is committed in that case.
    async fn materialize_template(
        &self,
        user: &UserId,
        id: RecurringBillId,
        period: Period,
        now: DateTime<Utc>,
    ) -> Result<Option<Bill>, LedgerError>;

    // Alerts.
    async fn list_alerts(
        &self,
        user: &UserId,
        is_active: Option<bool>,
    ) -> Result<Vec<Alert>, LedgerError>;
    async fn create_alert(
        &self,
        user: &UserId,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<Alert, LedgerError>;
    async fn update_alert(
        &self,
        user: &UserId,
        id: AlertId,
        patch: &AlertPatch,
    ) -> Result<Alert, LedgerError>;
    async fn delete_alert(&self, user: &UserId, id: AlertId) -> Result<(), LedgerError>;
    /// Active usage/cost threshold alerts scoped to `utility_type` or to
    /// all types.
    async fn active_threshold_alerts(
        &self,
        user: &UserId,
        utility_type: UtilityTypeId,
    ) -> Result<Vec<Alert>, LedgerError>;
    async fn active_promotion_alerts(&self, user: &UserId) -> Result<Vec<Alert>, LedgerError>;
    /// Notification insert + `last_triggered` stamp (+ optional
    /// deactivation) in one transaction.
    async fn record_trigger(
        &self,
        user: &UserId,
        alert_id: AlertId,
        draft: &NotificationDraft,
        now: DateTime<Utc>,
        deactivate: bool,
    ) -> Result<Notification, LedgerError>;

    // Notification inbox.
    async fn list_notifications(
        &self,
        user: &UserId,
        filter: &InboxFilter,
    ) -> Result<InboxPage, LedgerError>;
    /// Flips `is_read` to true (no-op if already read). `NotFound` if the
    /// row is missing, `Forbidden` if it belongs to another user.
    async fn mark_notification_read(
        &self,
        user: &UserId,
        id: NotificationId,
    ) -> Result<Notification, LedgerError>;
}
