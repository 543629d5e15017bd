//! hosd service internals
//!
//! The binary in `main.rs` owns the socket, signals and rate limiting. This
//! library holds the part that turns a request into a response plus the
//! events to broadcast, so it can be exercised without a running service.

mod dispatch;

pub use dispatch::*;
