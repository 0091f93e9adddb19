//! Single-owner concurrency guards.

pub mod in_flight;

pub use in_flight::{InFlightFlag, InFlightGuard};
