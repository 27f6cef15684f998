// SPDX-License-Identifier: Apache-2.0

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const USER_ID_MAX_LEN: usize = 128;

/// Opaque identity injected by the gateway (`x-user-id`). The ledger never
/// interprets it beyond equality; every row is scoped to exactly one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct UserId(String);

impl UserId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("user id must not be empty".to_string()));
        }
        if s != input {
            return Err(ValidationError(
                "user id must not contain leading/trailing whitespace".to_string(),
            ));
        }
        if s.len() > USER_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "user id exceeds max length {USER_ID_MAX_LEN}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(UtilityTypeId);
row_id!(BillId);
row_id!(RecurringBillId);
row_id!(AlertId);
row_id!(NotificationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty_and_padded_input() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse(" u1 ").is_err());
        assert!(UserId::parse(&"x".repeat(USER_ID_MAX_LEN + 1)).is_err());
        assert_eq!(UserId::parse("u1").expect("valid").as_str(), "u1");
    }

    #[test]
    fn row_ids_round_trip_through_json() {
        let id = BillId::new(42);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "42");
        let back: BillId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
