//! Request dispatching.
//!
//! # Data Flow
//! ```text
//! mpsc queue
//!     → processor.rs (single consumer)
//!         device name? → DeviceDirectory::resolve
//!         otherwise    → literal mac/broadcast
//!     → WakeSender::send (one magic packet)
//! ```
//!
//! # Design Decisions
//! - Every per-request failure is logged and dropped; nothing is retried
//! - On cancellation the queue is closed and already-queued requests drain

pub mod processor;

pub use processor::{DispatchError, Dispatched, Dispatcher};
