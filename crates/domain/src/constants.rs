//! Domain constants for the network resilience subsystem.

use std::time::Duration;

/// Key under which the bearer credential is persisted.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key under which the serialized user snapshot is persisted.
///
/// Removed together with [`AUTH_TOKEN_KEY`] whenever a 401 is observed.
pub const USER_SNAPSHOT_KEY: &str = "user_info";

/// Path of the lightweight health probe, relative to the API base URL.
pub const HEALTH_PATH: &str = "/health";

/// Default API base URL when no configuration is provided.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// How long a cached diagnostics report stays valid.
pub const DIAGNOSTICS_CACHE_TTL: Duration = Duration::from_secs(60);

/// How long the passive monitor trusts its last status before re-probing.
pub const STATUS_CACHE_TTL: Duration = Duration::from_secs(30);

/// Number of sequential latency probes in one diagnostics battery.
pub const PING_COUNT: u32 = 3;

/// Pause between consecutive latency probes.
pub const PING_INTERVAL: Duration = Duration::from_millis(300);

/// Timeout applied to every reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Average latency above which a download speed measurement is taken.
pub const SPEED_TEST_LATENCY_THRESHOLD: Duration = Duration::from_millis(200);

/// Fixed delay before the one-shot deferred registration retry fires.
pub const DEFERRED_RETRY_DELAY: Duration = Duration::from_secs(30);
