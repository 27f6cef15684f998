// SPDX-License-Identifier: Apache-2.0

use crate::ids::{AlertId, UserId, UtilityTypeId};
use crate::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMOTION_LEAD_DAYS: u32 = 7;
const LEAD_DAYS_MAX: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Comparison {
    GreaterThan,
    LessThan,
    Equals,
}

impl Default for Comparison {
    fn default() -> Self {
        Self::GreaterThan
    }
}

impl Comparison {
    /// Exact float equality for `Equals` is deliberate: it matches the
    /// behavior users already rely on, even though it rarely fires for
    /// fractional thresholds.
    #[must_use]
    pub fn matches(self, observed: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => observed > threshold,
            Self::LessThan => observed < threshold,
            Self::Equals => observed == threshold,
        }
    }

    /// Verb phrase used in notification messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::GreaterThan => "exceeded",
            Self::LessThan => "fallen below",
            Self::Equals => "reached",
        }
    }
}

/// Alert configuration, one variant per alert type. The stored blob is
/// decoded into this sum type at the store boundary; invalid shapes are
/// rejected at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert_type", rename_all = "snake_case")]
pub enum AlertConfig {
    /// Accepted and stored for parity with the bill CRUD surface; nothing
    /// evaluates it yet.
    BillReminder {
        #[serde(default)]
        days_before: u32,
    },
    UsageThreshold {
        threshold: f64,
        #[serde(default)]
        comparison: Comparison,
        #[serde(default)]
        unit: Option<String>,
    },
    CostThreshold {
        threshold: f64,
        #[serde(default)]
        comparison: Comparison,
    },
    PromotionEnd {
        end_date: NaiveDate,
        #[serde(default)]
        promotion_name: Option<String>,
        #[serde(default)]
        utility_name: Option<String>,
        #[serde(default = "default_lead_days")]
        days_before: u32,
    },
}

fn default_lead_days() -> u32 {
    DEFAULT_PROMOTION_LEAD_DAYS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BillReminder,
    UsageThreshold,
    CostThreshold,
    PromotionEnd,
}

impl AlertKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BillReminder => "bill_reminder",
            Self::UsageThreshold => "usage_threshold",
            Self::CostThreshold => "cost_threshold",
            Self::PromotionEnd => "promotion_end",
        }
    }
}

impl AlertConfig {
    /// Decode from the wire/storage split representation: a type tag next
    /// to a schema-less configuration object. The tag is folded into the
    /// blob so the tagged union drives validation.
    pub fn from_wire(
        alert_type: &str,
        configuration: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let mut blob = match configuration {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ValidationError(format!(
                    "configuration must be an object, got {other}"
                )))
            }
        };
        blob.insert(
            "alert_type".to_string(),
            serde_json::Value::String(alert_type.to_string()),
        );
        let config: Self = serde_json::from_value(serde_json::Value::Object(blob))
            .map_err(|e| ValidationError(format!("invalid {alert_type} configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Inverse of [`AlertConfig::from_wire`]: the tag and the bare
    /// configuration object.
    pub fn to_wire(&self) -> Result<(AlertKind, serde_json::Value), serde_json::Error> {
        let kind = self.kind();
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("alert_type");
        }
        Ok((kind, value))
    }

    #[must_use]
    pub const fn kind(&self) -> AlertKind {
        match self {
            Self::BillReminder { .. } => AlertKind::BillReminder,
            Self::UsageThreshold { .. } => AlertKind::UsageThreshold,
            Self::CostThreshold { .. } => AlertKind::CostThreshold,
            Self::PromotionEnd { .. } => AlertKind::PromotionEnd,
        }
    }

    #[must_use]
    pub const fn is_threshold(&self) -> bool {
        matches!(
            self,
            Self::UsageThreshold { .. } | Self::CostThreshold { .. }
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::BillReminder { days_before } | Self::PromotionEnd { days_before, .. } => {
                if *days_before > LEAD_DAYS_MAX {
                    return Err(ValidationError(format!(
                        "days_before exceeds max {LEAD_DAYS_MAX}"
                    )));
                }
            }
            Self::UsageThreshold { threshold, .. } | Self::CostThreshold { threshold, .. } => {
                if !threshold.is_finite() || *threshold <= 0.0 {
                    return Err(ValidationError(format!(
                        "threshold must be positive: {threshold}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utility_type_id: Option<UtilityTypeId>,
    #[serde(flatten)]
    pub config: AlertConfig,
    pub is_active: bool,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub utility_type_id: Option<UtilityTypeId>,
    pub config: AlertConfig,
}

impl AlertDraft {
    /// Wire shape: `{"alert_type": "...", "utility_type_id": ...,
    /// "configuration": {...}}`.
    pub fn from_wire(body: serde_json::Value) -> Result<Self, ValidationError> {
        #[derive(Deserialize)]
        struct Wire {
            alert_type: String,
            #[serde(default)]
            utility_type_id: Option<UtilityTypeId>,
            configuration: serde_json::Value,
        }
        let wire: Wire = serde_json::from_value(body)
            .map_err(|e| ValidationError(format!("invalid alert body: {e}")))?;
        let config = AlertConfig::from_wire(&wire.alert_type, wire.configuration)?;
        let draft = Self {
            utility_type_id: wire.utility_type_id,
            config,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.config.validate()?;
        if self.utility_type_id.is_some() && self.config.kind() == AlertKind::PromotionEnd {
            return Err(ValidationError(
                "promotion_end alerts apply to all utility types; utility_type_id must be null"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update. `configuration` stays a raw blob here: its schema
/// depends on the row's existing alert type, so the store decodes it
/// against that tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertPatch {
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl AlertPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configuration.is_none() && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_tag_dispatch_decodes_each_variant() {
        let usage: AlertConfig = serde_json::from_str(
            r#"{"alert_type":"usage_threshold","threshold":150.0,"unit":"kWh"}"#,
        )
        .expect("usage config");
        assert_eq!(usage.kind(), AlertKind::UsageThreshold);
        match usage {
            AlertConfig::UsageThreshold { comparison, .. } => {
                assert_eq!(comparison, Comparison::GreaterThan);
            }
            other => panic!("unexpected variant: {other:?}"),
        }

        let promo: AlertConfig = serde_json::from_str(
            r#"{"alert_type":"promotion_end","end_date":"2026-09-01"}"#,
        )
        .expect("promotion config");
        match promo {
            AlertConfig::PromotionEnd { days_before, .. } => {
                assert_eq!(days_before, DEFAULT_PROMOTION_LEAD_DAYS);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_alert_type_is_rejected_at_decode() {
        let result: Result<AlertConfig, _> =
            serde_json::from_str(r#"{"alert_type":"budget_overrun","threshold":1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn wire_split_representation_round_trips() {
        let config = AlertConfig::from_wire(
            "cost_threshold",
            serde_json::json!({"threshold": 100.0, "comparison": "less_than"}),
        )
        .expect("decode");
        let (kind, blob) = config.to_wire().expect("encode");
        assert_eq!(kind, AlertKind::CostThreshold);
        assert!(blob.is_object());
        assert_eq!(blob["threshold"], 100.0);
        assert_eq!(blob["comparison"], "less_than");
        assert!(blob.get("alert_type").is_none());

        assert!(AlertConfig::from_wire("cost_threshold", serde_json::json!([1, 2])).is_err());
        assert!(AlertConfig::from_wire("promotion_end", serde_json::json!({})).is_err());
    }

    #[test]
    fn draft_wire_decode_validates_schema_by_tag() {
        let draft = AlertDraft::from_wire(serde_json::json!({
            "alert_type": "usage_threshold",
            "utility_type_id": 2,
            "configuration": {"threshold": 500.0, "unit": "kWh"}
        }))
        .expect("draft");
        assert_eq!(draft.utility_type_id, Some(UtilityTypeId::new(2)));
        assert_eq!(draft.config.kind(), AlertKind::UsageThreshold);

        // Threshold field missing entirely.
        assert!(AlertDraft::from_wire(serde_json::json!({
            "alert_type": "usage_threshold",
            "configuration": {"unit": "kWh"}
        }))
        .is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_thresholds() {
        let config = AlertConfig::CostThreshold {
            threshold: 0.0,
            comparison: Comparison::GreaterThan,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn promotion_draft_must_not_target_a_utility_type() {
        let draft = AlertDraft {
            utility_type_id: Some(UtilityTypeId::new(3)),
            config: AlertConfig::PromotionEnd {
                end_date: NaiveDate::from_ymd_opt(2026, 9, 1).expect("date"),
                promotion_name: None,
                utility_name: None,
                days_before: DEFAULT_PROMOTION_LEAD_DAYS,
            },
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn comparison_matches_are_exact_for_equals() {
        assert!(Comparison::GreaterThan.matches(150.0, 100.0));
        assert!(!Comparison::GreaterThan.matches(99.99, 100.0));
        assert!(Comparison::LessThan.matches(99.99, 100.0));
        assert!(Comparison::Equals.matches(100.0, 100.0));
        // Exact compare: a value one ulp away does not fire. Known fidelity
        // tradeoff, see DESIGN.md.
        assert!(!Comparison::Equals.matches(100.0 + f64::EPSILON * 100.0, 100.0));
    }
}
