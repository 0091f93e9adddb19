//! # Hearth Net
//!
//! The client-side network resilience subsystem.
//!
//! This crate contains:
//! - `transport`: the injected HTTP capability (reqwest implementation
//!   plus the port the rest of the crate is tested against)
//! - `credentials`: the persisted bearer credential / user snapshot
//!   store (platform keyring or in-memory)
//! - `gateway`: the request gateway that wraps every outbound call in
//!   a uniform result envelope and broadcasts session expiry
//! - `diagnostics`: the active prober (reachability, latency, jitter,
//!   packet loss, optional speed test) with a TTL'd cache
//! - `monitor`: the passive, periodically-ticking health monitor
//! - `registration`: the deferred push-token registration retry
//!
//! ## Composition
//!
//! Construct one [`monitor::NetworkMonitor`] and one
//! [`diagnostics::DiagnosticsEngine`] at the composition root and share
//! them via `Arc`; there are no module-level singletons. All components
//! take the transport and credential store as injected ports so they
//! can be unit tested against fakes.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod gateway;
pub mod monitor;
pub mod registration;
pub mod transport;

// Re-export commonly used items
pub use config::NetConfig;
pub use credentials::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use diagnostics::{classify_quality, describe_status, troubleshooting_suggestions, DiagnosticsEngine};
pub use gateway::ApiGateway;
pub use monitor::NetworkMonitor;
pub use registration::{DeviceProfile, PushRegistrar};
pub use transport::{
    HttpMethod, HttpTransport, NetworkInfo, StaticNetworkInfo, Transport, TransportError,
    TransportErrorKind, TransportRequest, TransportResponse,
};
