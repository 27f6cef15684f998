// SPDX-License-Identifier: Apache-2.0

use crate::ids::{BillId, UserId, UtilityTypeId};
use crate::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NeedPayment,
    Paid,
    AutoPay,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeedPayment => "need_payment",
            Self::Paid => "paid",
            Self::AutoPay => "auto_pay",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input {
            "need_payment" => Ok(Self::NeedPayment),
            "paid" => Ok(Self::Paid),
            "auto_pay" => Ok(Self::AutoPay),
            other => Err(ValidationError(format!("invalid payment status: {other}"))),
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::NeedPayment
    }
}

/// Provenance of a bill row. An explicit column, so generated bills are
/// queryable without sniffing free-text notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillOrigin {
    Manual,
    Recurring,
}

impl BillOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Recurring => "recurring",
        }
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input {
            "manual" => Ok(Self::Manual),
            "recurring" => Ok(Self::Recurring),
            other => Err(ValidationError(format!("invalid bill origin: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub user_id: UserId,
    pub utility_type_id: UtilityTypeId,
    pub amount: f64,
    pub bill_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub usage_amount: Option<f64>,
    pub notes: Option<String>,
    pub payment_status: PaymentStatus,
    pub origin: BillOrigin,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillDraft {
    pub utility_type_id: UtilityTypeId,
    pub amount: f64,
    pub bill_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default = "manual_origin", skip_deserializing)]
    pub origin: BillOrigin,
}

fn manual_origin() -> BillOrigin {
    BillOrigin::Manual
}

impl BillDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_amount(self.amount)?;
        if let Some(usage) = self.usage_amount {
            if !usage.is_finite() || usage <= 0.0 {
                return Err(ValidationError(format!(
                    "usage_amount must be positive: {usage}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillPatch {
    #[serde(default)]
    pub utility_type_id: Option<UtilityTypeId>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub bill_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub usage_amount: Option<Option<f64>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl BillPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if let Some(Some(usage)) = self.usage_amount {
            if !usage.is_finite() || usage <= 0.0 {
                return Err(ValidationError(format!(
                    "usage_amount must be positive: {usage}"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utility_type_id.is_none()
            && self.amount.is_none()
            && self.bill_date.is_none()
            && self.due_date.is_none()
            && self.usage_amount.is_none()
            && self.notes.is_none()
            && self.payment_status.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub utility_type_id: Option<UtilityTypeId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillPage {
    pub bills: Vec<Bill>,
    pub total: u64,
}

/// Amounts are money: positive, finite, at most two decimal places.
pub fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ValidationError(format!("amount must be positive: {amount}")));
    }
    let cents = amount * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(ValidationError(format!(
            "amount must have at most two decimal places: {amount}"
        )));
    }
    Ok(())
}
