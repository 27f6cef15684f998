// SPDX-License-Identifier: Apache-2.0

use crate::error::LedgerError;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

/// Referential checks (delete-type-with-bills, template pointing at a
/// deleted type) are enforced in the store operations, not by SQLite
/// foreign keys: a template whose utility type was deleted must stay
/// readable so materialization can skip it with a dependency error.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS utility_types (
  id INTEGER PRIMARY KEY,
  user_id TEXT,
  name TEXT NOT NULL,
  description TEXT,
  unit_of_measurement TEXT,
  is_system_type INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_utility_types_owner ON utility_types(user_id);

CREATE TABLE IF NOT EXISTS bills (
  id INTEGER PRIMARY KEY,
  user_id TEXT NOT NULL,
  utility_type_id INTEGER NOT NULL,
  amount REAL NOT NULL,
  bill_date TEXT NOT NULL,
  due_date TEXT,
  usage_amount REAL,
  notes TEXT,
  payment_status TEXT NOT NULL DEFAULT 'need_payment',
  origin TEXT NOT NULL DEFAULT 'manual',
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bills_user_date ON bills(user_id, bill_date);
CREATE INDEX IF NOT EXISTS idx_bills_utility_type ON bills(utility_type_id);

CREATE TABLE IF NOT EXISTS recurring_bills (
  id INTEGER PRIMARY KEY,
  user_id TEXT NOT NULL,
  utility_type_id INTEGER NOT NULL,
  amount REAL NOT NULL,
  day_of_month INTEGER NOT NULL,
  notes TEXT,
  is_active INTEGER NOT NULL DEFAULT 1,
  last_generated TEXT,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recurring_user_day ON recurring_bills(user_id, day_of_month);

CREATE TABLE IF NOT EXISTS alerts (
  id INTEGER PRIMARY KEY,
  user_id TEXT NOT NULL,
  alert_type TEXT NOT NULL,
  utility_type_id INTEGER,
  configuration TEXT NOT NULL,
  is_active INTEGER NOT NULL DEFAULT 1,
  last_triggered TEXT,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_user_active ON alerts(user_id, is_active);

CREATE TABLE IF NOT EXISTS notifications (
  id INTEGER PRIMARY KEY,
  user_id TEXT NOT NULL,
  alert_id INTEGER,
  title TEXT NOT NULL,
  message TEXT NOT NULL,
  notification_type TEXT NOT NULL,
  is_read INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_user_read ON notifications(user_id, is_read);
";

pub fn apply_schema(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))?;
    Ok(())
}
