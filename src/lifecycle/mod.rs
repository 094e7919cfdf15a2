//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → registry + retry executor → health aggregator → checks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → admin server stops accepting → in-flight requests drain
//! ```
//!
//! # Design Decisions
//! - Components are built once and shared via `Arc`; nothing is global
//! - Shutdown is a broadcast so any number of tasks can observe it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::Components;
