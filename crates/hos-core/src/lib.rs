//! Hours-of-service engine for hosd
//!
//! This crate is the heart of hosd, containing:
//! - The time-accumulation calculator (pure projection of the open interval)
//! - The violation and eligibility evaluator (fixed rule table)
//! - The transition controller (the only ledger mutator)
//! - Per-driver serialisation and monotonic elapsed-time anchors

mod calculator;
mod engine;
mod error;
mod evaluator;
mod events;
pub mod rules;
mod summary;
mod transition;

pub use calculator::*;
pub use engine::*;
pub use error::*;
pub use evaluator::*;
pub use events::*;
pub use summary::*;
pub use transition::*;
