//! Runtime configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::DEFAULT_POLL_INTERVAL_SECS;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Snapshot file for durable state (None = memory only)
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    /// Advisory status poll interval handed to clients
    pub poll_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080))),
            snapshot_path: None,
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BIND_ADDR '{}': {}, using default", raw, e);
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let snapshot_path = std::env::var("SNAPSHOT_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let snapshot_interval = env_secs("SNAPSHOT_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.snapshot_interval);

        let poll_interval_secs =
            env_secs("POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval_secs);

        Self {
            bind_addr,
            snapshot_path,
            snapshot_interval,
            poll_interval_secs,
        }
    }
}

/// Positive whole seconds from an env var
fn env_secs(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!("Ignoring invalid {}='{}'", key, raw);
            None
        }
    }
}
