// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerErrorCode {
    /// Malformed input: bad enum value, invalid alert configuration shape.
    Validation,
    NotFound,
    /// Entity exists but belongs to a different user (or is a system row).
    Forbidden,
    /// State conflict: duplicate name, delete blocked by referencing rows.
    Conflict,
    /// A referenced row disappeared after creation; per-item skip, not
    /// fatal to a batch.
    Dependency,
    /// Store unavailable; the caller may retry the whole operation.
    Transient,
    Internal,
}

impl LedgerErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Dependency => "dependency_error",
            Self::Transient => "transient_store_error",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerError {
    pub code: LedgerErrorCode,
    pub message: String,
}

impl LedgerError {
    #[must_use]
    pub fn new(code: LedgerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::Validation, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::Forbidden, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::Conflict, message)
    }

    #[must_use]
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::Dependency, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(LedgerErrorCode::Internal, message)
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for LedgerError {}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::new(LedgerErrorCode::Transient, e.to_string())
            }
            _ => Self::new(LedgerErrorCode::Internal, e.to_string()),
        }
    }
}

impl From<billbook_model::ValidationError> for LedgerError {
    fn from(e: billbook_model::ValidationError) -> Self {
        Self::validation(e.0)
    }
}
