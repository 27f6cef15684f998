// SPDX-License-Identifier: Apache-2.0

use crate::error::{ApiError, ApiErrorCode};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use billbook_model::UserId;

/// Caller identity, taken from the `x-user-id` header the gateway injects
/// after verifying the session. The service itself holds no credentials.
pub struct Authed(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Authed
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(ApiErrorCode::Unauthorized, "missing x-user-id header")
            })?;
        UserId::parse(raw)
            .map(Authed)
            .map_err(|e| ApiError::new(ApiErrorCode::Unauthorized, e.0))
    }
}
