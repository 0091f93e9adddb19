//! Reusable runtime primitives shared across Hearth crates.
//!
//! This crate contains the generic building blocks the network
//! resilience subsystem is assembled from:
//! - `resilience`: sequential retry with exponential backoff
//! - `events`: a small typed pub/sub bus with opaque subscriptions
//! - `sync`: the in-flight flag used to serialize diagnostic runs
//!
//! Nothing in here knows about HTTP, credentials, or the API wire
//! format; those concerns live in `hearth-net`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod events;
pub mod resilience;
pub mod sync;

// Re-export commonly used types for convenience
pub use events::{EventBus, Subscription};
pub use resilience::{run_with_retry, RetryConfig, RetryOutcome};
pub use sync::{InFlightFlag, InFlightGuard};
