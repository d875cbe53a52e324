//! HomeGuard Wake-on-LAN relay library

pub mod client;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod lifecycle;
pub mod listener;
pub mod observability;
pub mod request;
pub mod resilience;
pub mod wol;

pub use config::RelayConfig;
pub use device::DeviceDirectory;
pub use lifecycle::{Relay, RunningRelay, Shutdown, ShutdownOutcome};
pub use request::{WakePayload, WakeRequest};
