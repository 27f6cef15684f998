// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use chrono::{Datelike, NaiveDate};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Calendar year-month unit. Recurring-bill idempotence is keyed on it:
/// a template generates at most one bill per `Period`.
///
/// The textual form is `YYYY-MM`, which sorts lexicographically in
/// chronological order; the store relies on that for its compare-and-set
/// guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError(format!("month out of range: {month}")));
        }
        if !(1970..=9999).contains(&year) {
            return Err(ValidationError(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The following calendar month.
    #[must_use]
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Concrete date for `day` within this period. `day` is capped at 28
    /// upstream, so this cannot fail for template data.
    #[must_use]
    pub fn date_at(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| ValidationError(format!("invalid period: {s}")))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(ValidationError(format!("invalid period: {s}")));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| ValidationError(format!("invalid period year: {s}")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| ValidationError(format!("invalid period month: {s}")))?;
        Self::new(year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: ValidationError| D::Error::custom(e.0))
    }
}
