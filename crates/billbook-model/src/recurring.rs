// SPDX-License-Identifier: Apache-2.0

use crate::ids::{RecurringBillId, UserId, UtilityTypeId};
use crate::period::Period;
use crate::{validate_amount, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Day-of-month cap. 28 keeps templates valid in every month, February
/// included.
pub const DAY_OF_MONTH_MAX: u32 = 28;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringBill {
    pub id: RecurringBillId,
    pub user_id: UserId,
    pub utility_type_id: UtilityTypeId,
    pub amount: f64,
    pub day_of_month: u32,
    pub notes: Option<String>,
    pub is_active: bool,
    /// Latest period this template has generated a bill for. Advances
    /// monotonically; the store's compare-and-set guard enforces it.
    pub last_generated: Option<Period>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringBillDraft {
    pub utility_type_id: UtilityTypeId,
    pub amount: f64,
    pub day_of_month: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl RecurringBillDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_amount(self.amount)?;
        validate_day_of_month(self.day_of_month)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecurringBillPatch {
    #[serde(default)]
    pub utility_type_id: Option<UtilityTypeId>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl RecurringBillPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if let Some(day) = self.day_of_month {
            validate_day_of_month(day)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utility_type_id.is_none()
            && self.amount.is_none()
            && self.day_of_month.is_none()
            && self.notes.is_none()
            && self.is_active.is_none()
    }
}

/// A template that is due for the current period, joined with the name of
/// its utility type for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct DueTemplate {
    pub recurring: RecurringBill,
    pub utility_type_name: String,
}

pub fn validate_day_of_month(day: u32) -> Result<(), ValidationError> {
    if !(1..=DAY_OF_MONTH_MAX).contains(&day) {
        return Err(ValidationError(format!(
            "day_of_month must be between 1 and {DAY_OF_MONTH_MAX}: {day}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UtilityTypeId;

    #[test]
    fn day_of_month_is_capped_at_28() {
        assert!(validate_day_of_month(1).is_ok());
        assert!(validate_day_of_month(28).is_ok());
        assert!(validate_day_of_month(0).is_err());
        assert!(validate_day_of_month(29).is_err());
    }

    #[test]
    fn draft_defaults_to_active() {
        let draft: RecurringBillDraft = serde_json::from_str(
            r#"{"utility_type_id":1,"amount":59.99,"day_of_month":15}"#,
        )
        .expect("deserialize");
        assert!(draft.is_active);
        assert_eq!(draft.utility_type_id, UtilityTypeId::new(1));
        assert!(draft.validate().is_ok());
    }
}
