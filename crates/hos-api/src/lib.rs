//! Data model and protocol types for hosd
//!
//! This crate defines the stable API between hosd and its clients:
//! - The duty-status ledger and its log entries
//! - Summaries, violations and eligibility results
//! - Commands, responses and events
//! - Versioning

mod commands;
mod events;
mod ledger;
mod types;

pub use commands::*;
pub use events::*;
pub use ledger::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
