//! # Hearth Domain
//!
//! Data types and models shared across Hearth crates.
//!
//! This crate contains:
//! - The API result envelope returned by every gateway call
//! - Network status and diagnostics report types
//! - Domain error types and Result definitions
//! - Domain constants (credential keys, probe parameters, cache TTLs)
//!
//! ## Architecture
//! - No dependencies on other Hearth crates
//! - Only external dependencies allowed
//! - Pure data structures; all behavior lives in `hearth-common` and
//!   `hearth-net`

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use errors::*;
pub use types::*;
