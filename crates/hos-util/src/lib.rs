//! Shared utilities for hosd
//!
//! This crate provides:
//! - ID types (DriverId, ClientId)
//! - Time utilities (clock abstraction, monotonic time, duration formatting)
//! - Rate limiting helpers
//! - Default paths for socket, data, and config files

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
