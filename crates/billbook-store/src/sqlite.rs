// SPDX-License-Identifier: Apache-2.0

use crate::error::{LedgerError, LedgerErrorCode};
use crate::rows::{
    RawAlertRow, RawBillRow, RawNotificationRow, RawRecurringRow, RawUtilityTypeRow,
    ALERT_COLUMNS, BILL_COLUMNS, NOTIFICATION_COLUMNS, RECURRING_COLUMNS, UTILITY_TYPE_COLUMNS,
};
use crate::schema::apply_schema;
use crate::LedgerStore;
use async_trait::async_trait;
use billbook_model::{
    Alert, AlertConfig, AlertDraft, AlertId, AlertPatch, Bill, BillDraft, BillFilter, BillId,
    BillPage, DueTemplate, InboxFilter, InboxPage, Notification, NotificationDraft,
    NotificationId, Period, RecurringBill, RecurringBillDraft, RecurringBillId,
    RecurringBillPatch, UserId, UtilityType, UtilityTypeDraft, UtilityTypeId, UtilityTypePatch,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// SQLite-backed ledger. One connection guarded by an async mutex: every
/// store operation runs its reads and writes on that connection, and the
/// multi-statement state transitions (materialize, record-trigger) run
/// inside an explicit transaction.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        apply_schema(&conn)?;
        debug!(path = %path.display(), "opened ledger database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Seed a shared system utility type if no type with that name exists
    /// yet. Used at startup; idempotent.
    pub async fn seed_system_type(
        &self,
        name: &str,
        unit_of_measurement: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM utility_types WHERE user_id IS NULL AND LOWER(name) = LOWER(?1)",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_none() {
            conn.execute(
                "INSERT INTO utility_types (user_id, name, unit_of_measurement, is_system_type, created_at)
                 VALUES (NULL, ?1, ?2, 1, ?3)",
                params![name, unit_of_measurement, now.to_rfc3339()],
            )?;
        }
        Ok(())
    }
}

fn fetch_utility_type(
    conn: &Connection,
    id: UtilityTypeId,
) -> Result<Option<UtilityType>, LedgerError> {
    let raw = conn
        .query_row(
            &format!("SELECT {UTILITY_TYPE_COLUMNS} FROM utility_types WHERE id = ?1"),
            params![id.as_i64()],
            RawUtilityTypeRow::from_sql_row,
        )
        .optional()?;
    raw.map(RawUtilityTypeRow::into_entity).transpose()
}

fn fetch_bill(conn: &Connection, id: BillId) -> Result<Option<Bill>, LedgerError> {
    let raw = conn
        .query_row(
            &format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1"),
            params![id.as_i64()],
            RawBillRow::from_sql_row,
        )
        .optional()?;
    raw.map(RawBillRow::into_entity).transpose()
}

fn fetch_recurring(
    conn: &Connection,
    id: RecurringBillId,
) -> Result<Option<RecurringBill>, LedgerError> {
    let raw = conn
        .query_row(
            &format!("SELECT {RECURRING_COLUMNS} FROM recurring_bills WHERE id = ?1"),
            params![id.as_i64()],
            RawRecurringRow::from_sql_row,
        )
        .optional()?;
    raw.map(RawRecurringRow::into_entity).transpose()
}

fn fetch_alert(conn: &Connection, id: AlertId) -> Result<Option<Alert>, LedgerError> {
    let raw = conn
        .query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
            params![id.as_i64()],
            RawAlertRow::from_sql_row,
        )
        .optional()?;
    raw.map(RawAlertRow::into_entity).transpose()
}

fn fetch_notification(
    conn: &Connection,
    id: NotificationId,
) -> Result<Option<Notification>, LedgerError> {
    let raw = conn
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id.as_i64()],
            RawNotificationRow::from_sql_row,
        )
        .optional()?;
    raw.map(RawNotificationRow::into_entity).transpose()
}

/// System type or owned by `user`.
fn utility_type_visible(
    conn: &Connection,
    user: &UserId,
    id: UtilityTypeId,
) -> Result<Option<UtilityType>, LedgerError> {
    match fetch_utility_type(conn, id)? {
        Some(ut) if ut.owner.is_none() || ut.owner.as_ref() == Some(user) => Ok(Some(ut)),
        _ => Ok(None),
    }
}

fn duplicate_type_name(
    conn: &Connection,
    user: &UserId,
    name: &str,
    exclude: Option<UtilityTypeId>,
) -> Result<bool, LedgerError> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM utility_types
             WHERE user_id = ?1 AND LOWER(name) = LOWER(?2) AND id != ?3",
            params![
                user.as_str(),
                name,
                exclude.map_or(-1, UtilityTypeId::as_i64)
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(existing.is_some())
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn ping(&self) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| LedgerError::new(LedgerErrorCode::Transient, e.to_string()))?;
        Ok(())
    }

    async fn list_utility_types(&self, user: &UserId) -> Result<Vec<UtilityType>, LedgerError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UTILITY_TYPE_COLUMNS} FROM utility_types
             WHERE user_id IS NULL OR user_id = ?1
             ORDER BY is_system_type DESC, name ASC"
        ))?;
        let raws = stmt
            .query_map(params![user.as_str()], RawUtilityTypeRow::from_sql_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter()
            .map(RawUtilityTypeRow::into_entity)
            .collect()
    }

    async fn get_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
    ) -> Result<UtilityType, LedgerError> {
        let conn = self.conn.lock().await;
        utility_type_visible(&conn, user, id)?
            .ok_or_else(|| LedgerError::not_found(format!("utility type {id} not found")))
    }

    async fn create_utility_type(
        &self,
        user: &UserId,
        draft: &UtilityTypeDraft,
        now: DateTime<Utc>,
    ) -> Result<UtilityType, LedgerError> {
        draft.validate()?;
        let conn = self.conn.lock().await;
        if duplicate_type_name(&conn, user, &draft.name, None)? {
            return Err(LedgerError::conflict(
                "utility type with this name already exists",
            ));
        }
        conn.execute(
            "INSERT INTO utility_types (user_id, name, description, unit_of_measurement, is_system_type, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                user.as_str(),
                draft.name,
                draft.description,
                draft.unit_of_measurement,
                now.to_rfc3339()
            ],
        )?;
        let id = UtilityTypeId::new(conn.last_insert_rowid());
        fetch_utility_type(&conn, id)?
            .ok_or_else(|| LedgerError::internal("inserted utility type vanished"))
    }

    async fn update_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
        patch: &UtilityTypePatch,
    ) -> Result<UtilityType, LedgerError> {
        patch.validate()?;
        if patch.is_empty() {
            return Err(LedgerError::validation("no valid fields to update"));
        }
        let conn = self.conn.lock().await;
        let existing = fetch_utility_type(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("utility type {id} not found")))?;
        if existing.is_system_type {
            return Err(LedgerError::forbidden("cannot modify system utility types"));
        }
        if existing.owner.as_ref() != Some(user) {
            return Err(LedgerError::forbidden(
                "not authorized to modify this utility type",
            ));
        }
        let name = patch.name.clone().unwrap_or(existing.name);
        if duplicate_type_name(&conn, user, &name, Some(id))? {
            return Err(LedgerError::conflict(
                "utility type with this name already exists",
            ));
        }
        let description = patch
            .description
            .clone()
            .unwrap_or(existing.description);
        let unit = patch
            .unit_of_measurement
            .clone()
            .unwrap_or(existing.unit_of_measurement);
        conn.execute(
            "UPDATE utility_types SET name = ?1, description = ?2, unit_of_measurement = ?3 WHERE id = ?4",
            params![name, description, unit, id.as_i64()],
        )?;
        fetch_utility_type(&conn, id)?
            .ok_or_else(|| LedgerError::internal("updated utility type vanished"))
    }

    async fn delete_utility_type(
        &self,
        user: &UserId,
        id: UtilityTypeId,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        let existing = fetch_utility_type(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("utility type {id} not found")))?;
        if existing.is_system_type {
            return Err(LedgerError::forbidden("cannot delete system utility types"));
        }
        if existing.owner.as_ref() != Some(user) {
            return Err(LedgerError::forbidden(
                "not authorized to delete this utility type",
            ));
        }
        let has_bills: Option<i64> = conn
            .query_row(
                "SELECT id FROM bills WHERE utility_type_id = ?1 LIMIT 1",
                params![id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        if has_bills.is_some() {
            return Err(LedgerError::conflict(
                "cannot delete utility type that has associated bills",
            ));
        }
        conn.execute(
            "DELETE FROM utility_types WHERE id = ?1",
            params![id.as_i64()],
        )?;
        Ok(())
    }

    async fn list_bills(
        &self,
        user: &UserId,
        filter: &BillFilter,
    ) -> Result<BillPage, LedgerError> {
        let conn = self.conn.lock().await;
        let mut clauses = String::from("user_id = ?1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user.as_str().to_string())];
        if let Some(ut) = filter.utility_type_id {
            args.push(Box::new(ut.as_i64()));
            clauses.push_str(&format!(" AND utility_type_id = ?{}", args.len()));
        }
        if let Some(start) = filter.start_date {
            args.push(Box::new(start.to_string()));
            clauses.push_str(&format!(" AND bill_date >= ?{}", args.len()));
        }
        if let Some(end) = filter.end_date {
            args.push(Box::new(end.to_string()));
            clauses.push_str(&format!(" AND bill_date <= ?{}", args.len()));
        }

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM bills WHERE {clauses}"),
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get(0),
        )?;

        args.push(Box::new(i64::from(filter.limit)));
        let limit_idx = args.len();
        args.push(Box::new(i64::from(filter.offset)));
        let offset_idx = args.len();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE {clauses}
             ORDER BY bill_date DESC, created_at DESC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        ))?;
        let raws = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                RawBillRow::from_sql_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        let bills = raws
            .into_iter()
            .map(RawBillRow::into_entity)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BillPage { bills, total })
    }

    async fn get_bill(&self, user: &UserId, id: BillId) -> Result<Bill, LedgerError> {
        let conn = self.conn.lock().await;
        let bill = fetch_bill(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("bill {id} not found")))?;
        if bill.user_id != *user {
            return Err(LedgerError::not_found(format!("bill {id} not found")));
        }
        Ok(bill)
    }

    async fn insert_bill(
        &self,
        user: &UserId,
        draft: &BillDraft,
        now: DateTime<Utc>,
    ) -> Result<Bill, LedgerError> {
        draft.validate()?;
        let conn = self.conn.lock().await;
        if utility_type_visible(&conn, user, draft.utility_type_id)?.is_none() {
            return Err(LedgerError::not_found(format!(
                "utility type {} not found",
                draft.utility_type_id
            )));
        }
        conn.execute(
            "INSERT INTO bills (user_id, utility_type_id, amount, bill_date, due_date, usage_amount, notes, payment_status, origin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.as_str(),
                draft.utility_type_id.as_i64(),
                draft.amount,
                draft.bill_date.to_string(),
                draft.due_date.map(|d| d.to_string()),
                draft.usage_amount,
                draft.notes,
                draft.payment_status.as_str(),
                draft.origin.as_str(),
                now.to_rfc3339()
            ],
        )?;
        let id = BillId::new(conn.last_insert_rowid());
        fetch_bill(&conn, id)?.ok_or_else(|| LedgerError::internal("inserted bill vanished"))
    }

    async fn update_bill(
        &self,
        user: &UserId,
        id: BillId,
        patch: &billbook_model::BillPatch,
    ) -> Result<Bill, LedgerError> {
        patch.validate()?;
        if patch.is_empty() {
            return Err(LedgerError::validation("no valid fields to update"));
        }
        let conn = self.conn.lock().await;
        let existing = fetch_bill(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("bill {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized to update this bill"));
        }
        let utility_type_id = patch.utility_type_id.unwrap_or(existing.utility_type_id);
        if patch.utility_type_id.is_some()
            && utility_type_visible(&conn, user, utility_type_id)?.is_none()
        {
            return Err(LedgerError::not_found(format!(
                "utility type {utility_type_id} not found"
            )));
        }
        let amount = patch.amount.unwrap_or(existing.amount);
        let bill_date = patch.bill_date.unwrap_or(existing.bill_date);
        let due_date = patch.due_date.unwrap_or(existing.due_date);
        let usage_amount = patch.usage_amount.unwrap_or(existing.usage_amount);
        let notes = patch.notes.clone().unwrap_or(existing.notes);
        let payment_status = patch.payment_status.unwrap_or(existing.payment_status);
        conn.execute(
            "UPDATE bills SET utility_type_id = ?1, amount = ?2, bill_date = ?3, due_date = ?4,
                              usage_amount = ?5, notes = ?6, payment_status = ?7
             WHERE id = ?8",
            params![
                utility_type_id.as_i64(),
                amount,
                bill_date.to_string(),
                due_date.map(|d| d.to_string()),
                usage_amount,
                notes,
                payment_status.as_str(),
                id.as_i64()
            ],
        )?;
        fetch_bill(&conn, id)?.ok_or_else(|| LedgerError::internal("updated bill vanished"))
    }

    async fn delete_bill(&self, user: &UserId, id: BillId) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        let existing = fetch_bill(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("bill {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized to delete this bill"));
        }
        conn.execute("DELETE FROM bills WHERE id = ?1", params![id.as_i64()])?;
        Ok(())
    }

    async fn list_recurring(&self, user: &UserId) -> Result<Vec<RecurringBill>, LedgerError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_bills
             WHERE user_id = ?1 ORDER BY day_of_month ASC"
        ))?;
        let raws = stmt
            .query_map(params![user.as_str()], RawRecurringRow::from_sql_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecurringRow::into_entity).collect()
    }

    async fn create_recurring(
        &self,
        user: &UserId,
        draft: &RecurringBillDraft,
        now: DateTime<Utc>,
    ) -> Result<RecurringBill, LedgerError> {
        draft.validate()?;
        let conn = self.conn.lock().await;
        if utility_type_visible(&conn, user, draft.utility_type_id)?.is_none() {
            return Err(LedgerError::not_found(format!(
                "utility type {} not found",
                draft.utility_type_id
            )));
        }
        conn.execute(
            "INSERT INTO recurring_bills (user_id, utility_type_id, amount, day_of_month, notes, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.as_str(),
                draft.utility_type_id.as_i64(),
                draft.amount,
                draft.day_of_month,
                draft.notes,
                draft.is_active,
                now.to_rfc3339()
            ],
        )?;
        let id = RecurringBillId::new(conn.last_insert_rowid());
        fetch_recurring(&conn, id)?
            .ok_or_else(|| LedgerError::internal("inserted recurring bill vanished"))
    }

    async fn update_recurring(
        &self,
        user: &UserId,
        id: RecurringBillId,
        patch: &RecurringBillPatch,
    ) -> Result<RecurringBill, LedgerError> {
        patch.validate()?;
        if patch.is_empty() {
            return Err(LedgerError::validation("no valid fields to update"));
        }
        let conn = self.conn.lock().await;
        let existing = fetch_recurring(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("recurring bill {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized"));
        }
        let utility_type_id = patch.utility_type_id.unwrap_or(existing.utility_type_id);
        if patch.utility_type_id.is_some()
            && utility_type_visible(&conn, user, utility_type_id)?.is_none()
        {
            return Err(LedgerError::not_found(format!(
                "utility type {utility_type_id} not found"
            )));
        }
        let amount = patch.amount.unwrap_or(existing.amount);
        let day_of_month = patch.day_of_month.unwrap_or(existing.day_of_month);
        let notes = patch.notes.clone().unwrap_or(existing.notes);
        let is_active = patch.is_active.unwrap_or(existing.is_active);
        conn.execute(
            "UPDATE recurring_bills SET utility_type_id = ?1, amount = ?2, day_of_month = ?3,
                                        notes = ?4, is_active = ?5
             WHERE id = ?6",
            params![
                utility_type_id.as_i64(),
                amount,
                day_of_month,
                notes,
                is_active,
                id.as_i64()
            ],
        )?;
        fetch_recurring(&conn, id)?
            .ok_or_else(|| LedgerError::internal("updated recurring bill vanished"))
    }

    async fn delete_recurring(
        &self,
        user: &UserId,
        id: RecurringBillId,
    ) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        let existing = fetch_recurring(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("recurring bill {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized"));
        }
        conn.execute(
            "DELETE FROM recurring_bills WHERE id = ?1",
            params![id.as_i64()],
        )?;
        Ok(())
    }

    async fn due_templates(
        &self,
        user: &UserId,
        period: Period,
        day_of_month: u32,
    ) -> Result<Vec<DueTemplate>, LedgerError> {
        let conn = self.conn.lock().await;
        // Inner join drops templates whose utility type is already gone;
        // the materialize step still guards against a delete racing in
        // between.
        let mut stmt = conn.prepare(
            "SELECT rb.id, rb.user_id, rb.utility_type_id, rb.amount, rb.day_of_month,
                    rb.notes, rb.is_active, rb.last_generated, rb.created_at, ut.name
             FROM recurring_bills rb
             INNER JOIN utility_types ut ON rb.utility_type_id = ut.id
             WHERE rb.user_id = ?1
               AND rb.is_active = 1
               AND (rb.last_generated IS NULL OR rb.last_generated < ?2)
               AND rb.day_of_month <= ?3
             ORDER BY rb.day_of_month ASC",
        )?;
        let raws = stmt
            .query_map(
                params![user.as_str(), period.to_string(), day_of_month],
                |row| {
                    let raw = RawRecurringRow::from_sql_row(row)?;
                    let name: String = row.get(9)?;
                    Ok((raw, name))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter()
            .map(|(raw, utility_type_name)| {
                Ok(DueTemplate {
                    recurring: raw.into_entity()?,
                    utility_type_name,
                })
            })
            .collect()
    }

    async fn materialize_template(
        &self,
        user: &UserId,
        id: RecurringBillId,
        period: Period,
        now: DateTime<Utc>,
    ) -> Result<Option<Bill>, LedgerError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let template = match fetch_recurring(&tx, id)? {
            Some(t) => t,
            None => {
                return Err(LedgerError::not_found(format!(
                    "recurring bill {id} not found"
                )))
            }
        };
        if template.user_id != *user {
            return Err(LedgerError::forbidden("not authorized"));
        }

        // Compare-and-set on last_generated. The period string sorts
        // lexicographically in chronological order, so `<` never lets the
        // marker regress. Zero rows changed means another call already
        // advanced the template for this period (or deactivated it).
        let changed = tx.execute(
            "UPDATE recurring_bills SET last_generated = ?1
             WHERE id = ?2 AND user_id = ?3 AND is_active = 1
               AND (last_generated IS NULL OR last_generated < ?1)",
            params![period.to_string(), id.as_i64(), user.as_str()],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        if utility_type_visible(&tx, user, template.utility_type_id)?.is_none() {
            // Dropping the transaction rolls back the CAS, so the template
            // is retried (and skipped again) on the next call.
            return Err(LedgerError::dependency(format!(
                "utility type {} for recurring bill {id} no longer exists",
                template.utility_type_id
            )));
        }

        let bill_date = period.date_at(template.day_of_month).ok_or_else(|| {
            LedgerError::internal(format!(
                "day {} invalid for period {period}",
                template.day_of_month
            ))
        })?;
        tx.execute(
            "INSERT INTO bills (user_id, utility_type_id, amount, bill_date, notes, payment_status, origin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'need_payment', 'recurring', ?6)",
            params![
                user.as_str(),
                template.utility_type_id.as_i64(),
                template.amount,
                bill_date.to_string(),
                template.notes,
                now.to_rfc3339()
            ],
        )?;
        let bill_id = BillId::new(tx.last_insert_rowid());
        let bill = fetch_bill(&tx, bill_id)?
            .ok_or_else(|| LedgerError::internal("materialized bill vanished"))?;
        tx.commit()?;
        Ok(Some(bill))
    }

    async fn list_alerts(
        &self,
        user: &UserId,
        is_active: Option<bool>,
    ) -> Result<Vec<Alert>, LedgerError> {
        let conn = self.conn.lock().await;
        let raws = match is_active {
            Some(active) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts
                     WHERE user_id = ?1 AND is_active = ?2 ORDER BY created_at DESC, id DESC"
                ))?;
                let rows = stmt
                    .query_map(params![user.as_str(), active], RawAlertRow::from_sql_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts
                     WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
                ))?;
                let rows = stmt
                    .query_map(params![user.as_str()], RawAlertRow::from_sql_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        raws.into_iter().map(RawAlertRow::into_entity).collect()
    }

    async fn create_alert(
        &self,
        user: &UserId,
        draft: &AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<Alert, LedgerError> {
        draft.validate()?;
        let conn = self.conn.lock().await;
        if let Some(ut) = draft.utility_type_id {
            if utility_type_visible(&conn, user, ut)?.is_none() {
                return Err(LedgerError::not_found(format!(
                    "utility type {ut} not found"
                )));
            }
        }
        let (kind, blob) = draft
            .config
            .to_wire()
            .map_err(|e| LedgerError::internal(format!("encode alert configuration: {e}")))?;
        conn.execute(
            "INSERT INTO alerts (user_id, alert_type, utility_type_id, configuration, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                user.as_str(),
                kind.as_str(),
                draft.utility_type_id.map(UtilityTypeId::as_i64),
                blob.to_string(),
                now.to_rfc3339()
            ],
        )?;
        let id = AlertId::new(conn.last_insert_rowid());
        fetch_alert(&conn, id)?.ok_or_else(|| LedgerError::internal("inserted alert vanished"))
    }

    async fn update_alert(
        &self,
        user: &UserId,
        id: AlertId,
        patch: &AlertPatch,
    ) -> Result<Alert, LedgerError> {
        if patch.is_empty() {
            return Err(LedgerError::validation("no valid fields to update"));
        }
        let conn = self.conn.lock().await;
        let existing = fetch_alert(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("alert {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized to update this alert"));
        }
        // The alert type is fixed at creation; a new configuration blob is
        // validated against the existing tag.
        let config = match &patch.configuration {
            Some(blob) => AlertConfig::from_wire(existing.config.kind().as_str(), blob.clone())
                .map_err(|e| LedgerError::validation(e.0))?,
            None => existing.config.clone(),
        };
        let is_active = patch.is_active.unwrap_or(existing.is_active);
        let (_, blob) = config
            .to_wire()
            .map_err(|e| LedgerError::internal(format!("encode alert configuration: {e}")))?;
        conn.execute(
            "UPDATE alerts SET configuration = ?1, is_active = ?2 WHERE id = ?3",
            params![blob.to_string(), is_active, id.as_i64()],
        )?;
        fetch_alert(&conn, id)?.ok_or_else(|| LedgerError::internal("updated alert vanished"))
    }

    async fn delete_alert(&self, user: &UserId, id: AlertId) -> Result<(), LedgerError> {
        let conn = self.conn.lock().await;
        let existing = fetch_alert(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("alert {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized to delete this alert"));
        }
        conn.execute("DELETE FROM alerts WHERE id = ?1", params![id.as_i64()])?;
        Ok(())
    }

    async fn active_threshold_alerts(
        &self,
        user: &UserId,
        utility_type: UtilityTypeId,
    ) -> Result<Vec<Alert>, LedgerError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE user_id = ?1 AND is_active = 1
               AND (utility_type_id = ?2 OR utility_type_id IS NULL)
               AND alert_type IN ('usage_threshold', 'cost_threshold')
             ORDER BY id ASC"
        ))?;
        let raws = stmt
            .query_map(
                params![user.as_str(), utility_type.as_i64()],
                RawAlertRow::from_sql_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawAlertRow::into_entity).collect()
    }

    async fn active_promotion_alerts(&self, user: &UserId) -> Result<Vec<Alert>, LedgerError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE user_id = ?1 AND is_active = 1 AND alert_type = 'promotion_end'
             ORDER BY id ASC"
        ))?;
        let raws = stmt
            .query_map(params![user.as_str()], RawAlertRow::from_sql_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawAlertRow::into_entity).collect()
    }

    async fn record_trigger(
        &self,
        user: &UserId,
        alert_id: AlertId,
        draft: &NotificationDraft,
        now: DateTime<Utc>,
        deactivate: bool,
    ) -> Result<Notification, LedgerError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let alert = fetch_alert(&tx, alert_id)?
            .ok_or_else(|| LedgerError::not_found(format!("alert {alert_id} not found")))?;
        if alert.user_id != *user {
            return Err(LedgerError::forbidden("not authorized"));
        }
        tx.execute(
            "INSERT INTO notifications (user_id, alert_id, title, message, notification_type, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                user.as_str(),
                alert_id.as_i64(),
                draft.title,
                draft.message,
                draft.kind.as_str(),
                now.to_rfc3339()
            ],
        )?;
        let notification_id = NotificationId::new(tx.last_insert_rowid());
        if deactivate {
            tx.execute(
                "UPDATE alerts SET last_triggered = ?1, is_active = 0 WHERE id = ?2",
                params![now.to_rfc3339(), alert_id.as_i64()],
            )?;
        } else {
            tx.execute(
                "UPDATE alerts SET last_triggered = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), alert_id.as_i64()],
            )?;
        }
        let notification = fetch_notification(&tx, notification_id)?
            .ok_or_else(|| LedgerError::internal("inserted notification vanished"))?;
        tx.commit()?;
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user: &UserId,
        filter: &InboxFilter,
    ) -> Result<InboxPage, LedgerError> {
        let conn = self.conn.lock().await;
        let total: u64 = match filter.is_read {
            Some(read) => conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = ?2",
                params![user.as_str(), read],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
                params![user.as_str()],
                |row| row.get(0),
            )?,
        };
        let unread_count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user.as_str()],
            |row| row.get(0),
        )?;
        let raws = match filter.is_read {
            Some(read) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                     WHERE user_id = ?1 AND is_read = ?2
                     ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
                ))?;
                let rows = stmt
                    .query_map(
                        params![user.as_str(), read, filter.limit, filter.offset],
                        RawNotificationRow::from_sql_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows = stmt
                    .query_map(
                        params![user.as_str(), filter.limit, filter.offset],
                        RawNotificationRow::from_sql_row,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        let notifications = raws
            .into_iter()
            .map(RawNotificationRow::into_entity)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InboxPage {
            notifications,
            total,
            unread_count,
        })
    }

    async fn mark_notification_read(
        &self,
        user: &UserId,
        id: NotificationId,
    ) -> Result<Notification, LedgerError> {
        let conn = self.conn.lock().await;
        let existing = fetch_notification(&conn, id)?
            .ok_or_else(|| LedgerError::not_found(format!("notification {id} not found")))?;
        if existing.user_id != *user {
            return Err(LedgerError::forbidden("not authorized"));
        }
        conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.as_i64()],
        )?;
        fetch_notification(&conn, id)?
            .ok_or_else(|| LedgerError::internal("updated notification vanished"))
    }
}
