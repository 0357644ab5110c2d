//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Scaffold (scaffold.rs) → Allow-list → Config tree → Watchers → Sweeper → Pipeline
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop watchers/sweeper → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: sources first, then background tasks, listener last
//! - Fail fast: any startup error is fatal; the same errors after startup are not
//! - Shutdown has timeout: background tasks are abandoned after a deadline

pub mod scaffold;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, Services, StartupError};
