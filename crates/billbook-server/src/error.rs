// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use billbook_store::{LedgerError, LedgerErrorCode};
use serde::Serialize;
use serde_json::json;

/// Wire error codes. Stable strings; clients switch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    Unauthorized,
    ValidationError,
    NotFound,
    UtilityTypeNotFound,
    Forbidden,
    DuplicateName,
    HasBills,
    NoUpdates,
    ServiceUnavailable,
    InternalError,
}

impl ApiErrorCode {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ValidationError | Self::NoUpdates => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UtilityTypeNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::DuplicateName | Self::HasBills => StatusCode::CONFLICT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Default mapping from the store taxonomy. Handlers that need a more
/// specific wire code (`UTILITY_TYPE_NOT_FOUND`, `HAS_BILLS`) remap before
/// converting.
impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let code = match e.code {
            LedgerErrorCode::Validation => ApiErrorCode::ValidationError,
            LedgerErrorCode::NotFound => ApiErrorCode::NotFound,
            LedgerErrorCode::Forbidden => ApiErrorCode::Forbidden,
            LedgerErrorCode::Conflict => ApiErrorCode::DuplicateName,
            LedgerErrorCode::Transient => ApiErrorCode::ServiceUnavailable,
            LedgerErrorCode::Dependency | LedgerErrorCode::Internal => ApiErrorCode::InternalError,
            _ => ApiErrorCode::InternalError,
        };
        Self::new(code, e.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.code.status(), Json(body)).into_response()
    }
}
