// SPDX-License-Identifier: Apache-2.0

use crate::ids::{AlertId, NotificationId, UserId};
use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Alert,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Alert => "alert",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "alert" => Ok(Self::Alert),
            other => Err(ValidationError(format!(
                "invalid notification type: {other}"
            ))),
        }
    }
}

/// A row in the user's inbox. Only the engine writes these; the only
/// mutation afterwards is `is_read` flipping false -> true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub alert_id: Option<AlertId>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InboxFilter {
    pub is_read: Option<bool>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxPage {
    pub notifications: Vec<Notification>,
    pub total: u64,
    pub unread_count: u64,
}
