// SPDX-License-Identifier: Apache-2.0

use crate::auth::Authed;
use crate::error::{ApiError, ApiErrorCode};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use billbook_engine::{check_promotions, evaluate_thresholds, materialize_due_bills};
use billbook_model::{
    AlertDraft, AlertId, AlertPatch, BillDraft, BillFilter, BillId, BillPatch, InboxFilter,
    NotificationId, RecurringBillDraft, RecurringBillId, RecurringBillPatch, UtilityTypeDraft,
    UtilityTypeId, UtilityTypePatch,
};
use billbook_store::LedgerErrorCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Remap a missing referenced utility type to its dedicated wire code.
fn type_ref_error(e: billbook_store::LedgerError) -> ApiError {
    match e.code {
        LedgerErrorCode::NotFound => ApiError::new(ApiErrorCode::UtilityTypeNotFound, e.message),
        _ => e.into(),
    }
}

fn no_updates() -> ApiError {
    ApiError::new(ApiErrorCode::NoUpdates, "no valid fields to update")
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.ledger.ping().await {
        Ok(()) => Json(json!({"status": "healthy", "service": "billbook"})).into_response(),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "service": "billbook"})),
            )
                .into_response()
        }
    }
}

// Utility types.

pub async fn list_types(
    State(state): State<AppState>,
    Authed(user): Authed,
) -> Result<Response, ApiError> {
    let types = state.ledger.list_utility_types(&user).await?;
    Ok(Json(types).into_response())
}

pub async fn create_type(
    State(state): State<AppState>,
    Authed(user): Authed,
    Json(draft): Json<UtilityTypeDraft>,
) -> Result<Response, ApiError> {
    let created = state
        .ledger
        .create_utility_type(&user, &draft, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update_type(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<UtilityTypeId>,
    Json(patch): Json<UtilityTypePatch>,
) -> Result<Response, ApiError> {
    if patch.is_empty() {
        return Err(no_updates());
    }
    let updated = state.ledger.update_utility_type(&user, id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_type(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<UtilityTypeId>,
) -> Result<Response, ApiError> {
    state
        .ledger
        .delete_utility_type(&user, id)
        .await
        .map_err(|e| match e.code {
            LedgerErrorCode::Conflict => ApiError::new(ApiErrorCode::HasBills, e.message),
            _ => e.into(),
        })?;
    Ok(Json(json!({"success": true})).into_response())
}

// Bills.

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListBillsQuery {
    #[serde(default)]
    utility_type_id: Option<UtilityTypeId>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

pub async fn list_bills(
    State(state): State<AppState>,
    Authed(user): Authed,
    Query(query): Query<ListBillsQuery>,
) -> Result<Response, ApiError> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    // Both values are client-controlled; widen before multiplying so an
    // absurd page number yields an empty page instead of overflowing.
    let offset = u64::from(page - 1).saturating_mul(u64::from(limit));
    let filter = BillFilter {
        utility_type_id: query.utility_type_id,
        start_date: query.start_date,
        end_date: query.end_date,
        limit,
        offset: u32::try_from(offset).unwrap_or(u32::MAX),
    };
    let result = state.ledger.list_bills(&user, &filter).await?;
    Ok(Json(json!({
        "bills": result.bills,
        "total": result.total,
        "page": page,
        "limit": limit,
    }))
    .into_response())
}

pub async fn get_bill(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<BillId>,
) -> Result<Response, ApiError> {
    let bill = state.ledger.get_bill(&user, id).await?;
    Ok(Json(bill).into_response())
}

pub async fn create_bill(
    State(state): State<AppState>,
    Authed(user): Authed,
    Json(draft): Json<BillDraft>,
) -> Result<Response, ApiError> {
    let now = state.clock.now();
    let bill = state
        .ledger
        .insert_bill(&user, &draft, now)
        .await
        .map_err(type_ref_error)?;
    // Best effort: a failed evaluation never fails the bill creation.
    if let Err(e) = evaluate_thresholds(state.ledger.as_ref(), &user, bill.id, now).await {
        warn!(user = %user, bill_id = %bill.id, error = %e, "threshold evaluation failed");
    }
    Ok((StatusCode::CREATED, Json(bill)).into_response())
}

pub async fn update_bill(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<BillId>,
    Json(patch): Json<BillPatch>,
) -> Result<Response, ApiError> {
    if patch.is_empty() {
        return Err(no_updates());
    }
    let updated = state.ledger.update_bill(&user, id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_bill(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<BillId>,
) -> Result<Response, ApiError> {
    state.ledger.delete_bill(&user, id).await?;
    Ok(Json(json!({"success": true})).into_response())
}

// Recurring bill templates.

pub async fn list_recurring(
    State(state): State<AppState>,
    Authed(user): Authed,
) -> Result<Response, ApiError> {
    let templates = state.ledger.list_recurring(&user).await?;
    Ok(Json(templates).into_response())
}

pub async fn create_recurring(
    State(state): State<AppState>,
    Authed(user): Authed,
    Json(draft): Json<RecurringBillDraft>,
) -> Result<Response, ApiError> {
    let created = state
        .ledger
        .create_recurring(&user, &draft, state.clock.now())
        .await
        .map_err(type_ref_error)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update_recurring(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<RecurringBillId>,
    Json(patch): Json<RecurringBillPatch>,
) -> Result<Response, ApiError> {
    if patch.is_empty() {
        return Err(no_updates());
    }
    let updated = state.ledger.update_recurring(&user, id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_recurring(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<RecurringBillId>,
) -> Result<Response, ApiError> {
    state.ledger.delete_recurring(&user, id).await?;
    Ok(Json(json!({"success": true})).into_response())
}

/// Materialize every due recurring template for the caller, as of today.
/// Idempotent within a month; see the engine for the guarantees.
pub async fn process_recurring(
    State(state): State<AppState>,
    Authed(user): Authed,
) -> Result<Response, ApiError> {
    let outcome = materialize_due_bills(
        state.ledger.as_ref(),
        &user,
        state.clock.today(),
        state.clock.now(),
    )
    .await?;
    Ok(Json(outcome).into_response())
}

// Alerts.

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    #[serde(default)]
    is_active: Option<bool>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Authed(user): Authed,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Response, ApiError> {
    let alerts = state.ledger.list_alerts(&user, query.is_active).await?;
    Ok(Json(alerts).into_response())
}

pub async fn create_alert(
    State(state): State<AppState>,
    Authed(user): Authed,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    // The configuration schema depends on alert_type, so the draft is
    // decoded from the raw body rather than a fixed shape.
    let draft = AlertDraft::from_wire(body)
        .map_err(|e| ApiError::new(ApiErrorCode::ValidationError, e.0))?;
    let created = state
        .ledger
        .create_alert(&user, &draft, state.clock.now())
        .await
        .map_err(type_ref_error)?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update_alert(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<AlertId>,
    Json(patch): Json<AlertPatch>,
) -> Result<Response, ApiError> {
    if patch.is_empty() {
        return Err(no_updates());
    }
    let updated = state.ledger.update_alert(&user, id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<AlertId>,
) -> Result<Response, ApiError> {
    state.ledger.delete_alert(&user, id).await?;
    Ok(Json(json!({"success": true})).into_response())
}

// Engine endpoints.

#[derive(Debug, Deserialize)]
pub struct CheckThresholdsBody {
    bill_id: BillId,
}

pub async fn check_thresholds_endpoint(
    State(state): State<AppState>,
    Authed(user): Authed,
    Json(body): Json<CheckThresholdsBody>,
) -> Result<Response, ApiError> {
    let triggered =
        evaluate_thresholds(state.ledger.as_ref(), &user, body.bill_id, state.clock.now()).await?;
    Ok(Json(json!({"triggered_alerts": triggered})).into_response())
}

pub async fn check_promotions_endpoint(
    State(state): State<AppState>,
    Authed(user): Authed,
) -> Result<Response, ApiError> {
    let triggered = check_promotions(
        state.ledger.as_ref(),
        &user,
        state.clock.today(),
        state.clock.now(),
    )
    .await?;
    Ok(Json(json!({"triggered_alerts": triggered})).into_response())
}

// Notification inbox.

fn default_inbox_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    is_read: Option<bool>,
    #[serde(default = "default_inbox_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Authed(user): Authed,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Response, ApiError> {
    let filter = InboxFilter {
        is_read: query.is_read,
        limit: query.limit.clamp(1, 200),
        offset: query.offset,
    };
    let inbox = state.ledger.list_notifications(&user, &filter).await?;
    Ok(Json(inbox).into_response())
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Authed(user): Authed,
    Path(id): Path<NotificationId>,
) -> Result<Response, ApiError> {
    let updated = state.ledger.mark_notification_read(&user, id).await?;
    Ok(Json(updated).into_response())
}
