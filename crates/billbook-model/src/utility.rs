// SPDX-License-Identifier: Apache-2.0

use crate::ids::{UserId, UtilityTypeId};
use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NAME_MAX_LEN: usize = 255;
const UNIT_MAX_LEN: usize = 50;

/// A category of utility (electricity, water, ...). `owner == None` marks a
/// shared system type visible to every user; owned types are private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityType {
    pub id: UtilityTypeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    pub name: String,
    pub description: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub is_system_type: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtilityTypeDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
}

impl UtilityTypeDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_unit(self.unit_of_measurement.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtilityTypePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub unit_of_measurement: Option<Option<String>>,
}

impl UtilityTypePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(unit) = &self.unit_of_measurement {
            validate_unit(unit.as_deref())?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.unit_of_measurement.is_none()
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError("name must not be empty".to_string()));
    }
    if name.len() > NAME_MAX_LEN {
        return Err(ValidationError(format!(
            "name exceeds max length {NAME_MAX_LEN}"
        )));
    }
    Ok(())
}

fn validate_unit(unit: Option<&str>) -> Result<(), ValidationError> {
    if let Some(unit) = unit {
        if unit.len() > UNIT_MAX_LEN {
            return Err(ValidationError(format!(
                "unit_of_measurement exceeds max length {UNIT_MAX_LEN}"
            )));
        }
    }
    Ok(())
}
