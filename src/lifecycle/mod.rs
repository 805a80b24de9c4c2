//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build proxy → Start admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop admin API → Drop watcher → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - In-flight requests finish on the snapshot they pinned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::Signal;
