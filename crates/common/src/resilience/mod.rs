//! Resilience patterns for fault tolerance.
//!
//! Currently a single primitive: sequential retry with exponential
//! backoff. The executor has no knowledge of what the operation does,
//! so the same code path serves the diagnostics reachability probe and
//! the deferred push-token registration retry.

pub mod retry;

pub use retry::{run_with_retry, RetryConfig, RetryOutcome};
