//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load devices (non-fatal) → Pick sender → Register listeners
//!
//! Run (relay.rs):
//!     spawn dispatcher + one task per listener, all sharing one token
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → RunningRelay::shutdown
//!
//! Shutdown (relay.rs + shutdown.rs):
//!     cancel token → stop() every listener → drop queue sender
//!         → wait for all tasks, bounded by the grace period
//! ```
//!
//! # Design Decisions
//! - One cancellation token per process, cloned into every task at spawn
//! - Listener stop failures are logged, never fatal
//! - Shutdown has timeout: remaining tasks are abandoned after the deadline

pub mod relay;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use relay::{Relay, RunningRelay, ShutdownOutcome, DEFAULT_GRACE, DEFAULT_QUEUE_CAPACITY};
pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::build_relay;
