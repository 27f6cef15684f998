// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Create the shared system utility types on startup if missing.
    pub seed_system_types: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            db_path: PathBuf::from("billbook.db"),
            seed_system_types: true,
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = env::var("BILLBOOK_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bind_addr);
        let db_path = env::var("BILLBOOK_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let seed_system_types = env_bool("BILLBOOK_SEED_SYSTEM_TYPES", defaults.seed_system_types);
        Self {
            bind_addr,
            db_path,
            seed_system_types,
        }
    }
}
