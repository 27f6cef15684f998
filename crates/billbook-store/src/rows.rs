// SPDX-License-Identifier: Apache-2.0

//! Raw row decoding. SQL rows come back as loosely typed columns; each
//! `Raw*Row` mirrors the column order of its SELECT and converts into the
//! strongly typed model entity in a second step, so type errors surface as
//! `LedgerError` instead of panics.

use crate::error::LedgerError;
use billbook_model::{
    Alert, AlertConfig, AlertId, Bill, BillId, BillOrigin, Notification, NotificationId,
    NotificationKind, PaymentStatus, Period, RecurringBill, RecurringBillId, UserId, UtilityType,
    UtilityTypeId,
};
use chrono::{DateTime, NaiveDate, Utc};

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::internal(format!("corrupt timestamp '{raw}': {e}")))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, LedgerError> {
    raw.parse()
        .map_err(|e| LedgerError::internal(format!("corrupt date '{raw}': {e}")))
}

pub(crate) fn parse_user(raw: String) -> Result<UserId, LedgerError> {
    UserId::parse(&raw).map_err(|e| LedgerError::internal(format!("corrupt user id: {e}")))
}

pub(crate) const UTILITY_TYPE_COLUMNS: &str =
    "id, user_id, name, description, unit_of_measurement, is_system_type, created_at";

#[derive(Debug)]
pub(crate) struct RawUtilityTypeRow {
    pub id: i64,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub is_system_type: bool,
    pub created_at: String,
}

impl RawUtilityTypeRow {
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            unit_of_measurement: row.get(4)?,
            is_system_type: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn into_entity(self) -> Result<UtilityType, LedgerError> {
        Ok(UtilityType {
            id: UtilityTypeId::new(self.id),
            owner: self.user_id.map(parse_user).transpose()?,
            name: self.name,
            description: self.description,
            unit_of_measurement: self.unit_of_measurement,
            is_system_type: self.is_system_type,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub(crate) const BILL_COLUMNS: &str = "id, user_id, utility_type_id, amount, bill_date, due_date, \
                                       usage_amount, notes, payment_status, origin, created_at";

#[derive(Debug)]
pub(crate) struct RawBillRow {
    pub id: i64,
    pub user_id: String,
    pub utility_type_id: i64,
    pub amount: f64,
    pub bill_date: String,
    pub due_date: Option<String>,
    pub usage_amount: Option<f64>,
    pub notes: Option<String>,
    pub payment_status: String,
    pub origin: String,
    pub created_at: String,
}

impl RawBillRow {
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            utility_type_id: row.get(2)?,
            amount: row.get(3)?,
            bill_date: row.get(4)?,
            due_date: row.get(5)?,
            usage_amount: row.get(6)?,
            notes: row.get(7)?,
            payment_status: row.get(8)?,
            origin: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    pub fn into_entity(self) -> Result<Bill, LedgerError> {
        Ok(Bill {
            id: BillId::new(self.id),
            user_id: parse_user(self.user_id)?,
            utility_type_id: UtilityTypeId::new(self.utility_type_id),
            amount: self.amount,
            bill_date: parse_date(&self.bill_date)?,
            due_date: self.due_date.as_deref().map(parse_date).transpose()?,
            usage_amount: self.usage_amount,
            notes: self.notes,
            payment_status: PaymentStatus::parse(&self.payment_status)
                .map_err(|e| LedgerError::internal(e.0))?,
            origin: BillOrigin::parse(&self.origin).map_err(|e| LedgerError::internal(e.0))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub(crate) const RECURRING_COLUMNS: &str = "id, user_id, utility_type_id, amount, day_of_month, \
                                            notes, is_active, last_generated, created_at";

#[derive(Debug)]
pub(crate) struct RawRecurringRow {
    pub id: i64,
    pub user_id: String,
    pub utility_type_id: i64,
    pub amount: f64,
    pub day_of_month: u32,
    pub notes: Option<String>,
    pub is_active: bool,
    pub last_generated: Option<String>,
    pub created_at: String,
}

impl RawRecurringRow {
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            utility_type_id: row.get(2)?,
            amount: row.get(3)?,
            day_of_month: row.get(4)?,
            notes: row.get(5)?,
            is_active: row.get(6)?,
            last_generated: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn into_entity(self) -> Result<RecurringBill, LedgerError> {
        let last_generated = self
            .last_generated
            .as_deref()
            .map(|raw| {
                raw.parse::<Period>()
                    .map_err(|e| LedgerError::internal(format!("corrupt period '{raw}': {e}")))
            })
            .transpose()?;
        Ok(RecurringBill {
            id: RecurringBillId::new(self.id),
            user_id: parse_user(self.user_id)?,
            utility_type_id: UtilityTypeId::new(self.utility_type_id),
            amount: self.amount,
            day_of_month: self.day_of_month,
            notes: self.notes,
            is_active: self.is_active,
            last_generated,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub(crate) const ALERT_COLUMNS: &str = "id, user_id, alert_type, utility_type_id, configuration, \
                                        is_active, last_triggered, created_at";

#[derive(Debug)]
pub(crate) struct RawAlertRow {
    pub id: i64,
    pub user_id: String,
    pub alert_type: String,
    pub utility_type_id: Option<i64>,
    pub configuration: String,
    pub is_active: bool,
    pub last_triggered: Option<String>,
    pub created_at: String,
}

impl RawAlertRow {
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            alert_type: row.get(2)?,
            utility_type_id: row.get(3)?,
            configuration: row.get(4)?,
            is_active: row.get(5)?,
            last_triggered: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn into_entity(self) -> Result<Alert, LedgerError> {
        let blob: serde_json::Value = serde_json::from_str(&self.configuration)
            .map_err(|e| LedgerError::internal(format!("corrupt alert configuration: {e}")))?;
        let config = AlertConfig::from_wire(&self.alert_type, blob)
            .map_err(|e| LedgerError::internal(e.0))?;
        Ok(Alert {
            id: AlertId::new(self.id),
            user_id: parse_user(self.user_id)?,
            utility_type_id: self.utility_type_id.map(UtilityTypeId::new),
            config,
            is_active: self.is_active,
            last_triggered: self
                .last_triggered
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, user_id, alert_id, title, message, notification_type, is_read, created_at";

#[derive(Debug)]
pub(crate) struct RawNotificationRow {
    pub id: i64,
    pub user_id: String,
    pub alert_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub created_at: String,
}

impl RawNotificationRow {
    pub fn from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            alert_id: row.get(2)?,
            title: row.get(3)?,
            message: row.get(4)?,
            notification_type: row.get(5)?,
            is_read: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn into_entity(self) -> Result<Notification, LedgerError> {
        Ok(Notification {
            id: NotificationId::new(self.id),
            user_id: parse_user(self.user_id)?,
            alert_id: self.alert_id.map(AlertId::new),
            title: self.title,
            message: self.message,
            notification_type: NotificationKind::parse(&self.notification_type)
                .map_err(|e| LedgerError::internal(e.0))?,
            is_read: self.is_read,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
