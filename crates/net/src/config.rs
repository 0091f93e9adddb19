//! Environment-driven configuration for the networking stack.

use std::env;
use std::time::Duration;

use hearth_domain::{
    HearthError, Result, DEFAULT_API_BASE_URL, HEALTH_PATH, PROBE_TIMEOUT,
};
use tracing::debug;

const ENV_BASE_URL: &str = "HEARTH_API_BASE_URL";
const ENV_REQUEST_TIMEOUT: &str = "HEARTH_REQUEST_TIMEOUT_SECS";
const ENV_MONITOR_INTERVAL: &str = "HEARTH_MONITOR_INTERVAL_SECS";

/// Runtime configuration shared by the gateway, diagnostics engine,
/// and passive monitor.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Base URL for the API, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to regular API requests.
    pub request_timeout: Duration,
    /// Timeout applied to reachability probes and latency pings.
    pub probe_timeout: Duration,
    /// How often the passive monitor re-checks connectivity.
    pub monitor_interval: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: PROBE_TIMEOUT,
            monitor_interval: Duration::from_secs(60),
        }
    }
}

impl NetConfig {
    /// Load configuration from the environment, falling back to
    /// defaults for anything unset. Reads a `.env` file when present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(base_url) = env::var(ENV_BASE_URL) {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = read_secs(ENV_REQUEST_TIMEOUT)? {
            config.request_timeout = timeout;
        }
        if let Some(interval) = read_secs(ENV_MONITOR_INTERVAL)? {
            config.monitor_interval = interval;
        }

        debug!(base_url = %config.base_url, "network configuration loaded");
        Ok(config)
    }

    /// Full URL of the server health endpoint used by probes.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, HEALTH_PATH)
    }
}

fn read_secs(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .map_err(|_| HearthError::Config(format!("{key} must be a whole number of seconds, got {raw:?}")))?;
            Ok(Some(Duration::from_secs(secs)))
        }
    }
}
