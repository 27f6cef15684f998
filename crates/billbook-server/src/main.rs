// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

use billbook_server::{
    build_router, AppState, Clock, ServerConfig, SystemClock, SYSTEM_UTILITY_TYPES,
};
use billbook_store::SqliteLedger;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let ledger = match SqliteLedger::open(&config.db_path) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!(path = %config.db_path.display(), error = %e, "failed to open ledger");
            return ExitCode::FAILURE;
        }
    };

    let clock = SystemClock;
    if config.seed_system_types {
        for (name, unit) in SYSTEM_UTILITY_TYPES {
            if let Err(e) = ledger.seed_system_type(name, *unit, clock.now()).await {
                error!(name, error = %e, "failed to seed system utility type");
                return ExitCode::FAILURE;
            }
        }
    }

    let state = AppState {
        ledger: Arc::new(ledger),
        clock: Arc::new(clock),
    };
    let router = build_router(state);

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.bind_addr, db = %config.db_path.display(), "billbook listening");
    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "server exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
