//! Typed pub/sub for in-process events.
//!
//! One bus per topic (session expiry, status changes) replaces the ad
//! hoc listener arrays the rest of the app would otherwise duplicate.

pub mod bus;

pub use bus::{EventBus, Subscription};
