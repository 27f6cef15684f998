#![forbid(unsafe_code)]
//! HTTP surface for billbook.
//!
//! Thin axum layer: extract identity and inputs, call the store or the
//! engine, translate [`billbook_store::LedgerError`] into the wire error
//! envelope. No domain rules live here.

mod auth;
mod clock;
mod config;
mod error;
mod handlers;

pub use auth::Authed;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServerConfig;
pub use error::{ApiError, ApiErrorCode};

use axum::routing::{get, post, put};
use axum::Router;
use billbook_store::LedgerStore;
use std::sync::Arc;

pub const CRATE_NAME: &str = "billbook-server";

/// Shared system utility types created at startup.
pub const SYSTEM_UTILITY_TYPES: &[(&str, Option<&str>)] = &[
    ("Electricity", Some("kWh")),
    ("Water", Some("gallons")),
    ("Gas", Some("therms")),
    ("Internet", None),
];

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub clock: Arc<dyn Clock>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/types", get(handlers::list_types).post(handlers::create_type))
        .route(
            "/types/:id",
            put(handlers::update_type).delete(handlers::delete_type),
        )
        .route("/bills", get(handlers::list_bills).post(handlers::create_bill))
        .route(
            "/bills/:id",
            get(handlers::get_bill)
                .put(handlers::update_bill)
                .delete(handlers::delete_bill),
        )
        .route(
            "/recurring",
            get(handlers::list_recurring).post(handlers::create_recurring),
        )
        .route(
            "/recurring/:id",
            put(handlers::update_recurring).delete(handlers::delete_recurring),
        )
        .route("/recurring/process", post(handlers::process_recurring))
        .route(
            "/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route(
            "/alerts/:id",
            put(handlers::update_alert).delete(handlers::delete_alert),
        )
        .route("/check-thresholds", post(handlers::check_thresholds_endpoint))
        .route("/check-promotions", post(handlers::check_promotions_endpoint))
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/:id/read",
            put(handlers::mark_notification_read),
        )
        .with_state(state)
}
