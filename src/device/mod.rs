//! Device directory subsystem.
//!
//! # Data Flow
//! ```text
//! config.yaml (devices: [...])
//!     → directory.rs (parse, validate every entry, all-or-nothing)
//!     → DeviceDirectory (immutable, shared via Arc)
//!     → dispatcher resolves device names to mac/broadcast pairs
//! ```
//!
//! # Design Decisions
//! - Built once at startup; no mutation API
//! - A single invalid entry fails the whole load
//! - A missing directory is tolerated by callers (direct addresses still work)

pub mod directory;

pub use directory::{Device, DeviceDirectory, DeviceError, DeviceFile};
