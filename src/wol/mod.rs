//! Wake-on-LAN packet subsystem.
//!
//! # Data Flow
//! ```text
//! "00:11:22:33:44:55", "192.168.1.255"
//!     → mac.rs (parse link-layer address)
//!     → packet.rs (6 × 0xFF + 16 × address)
//!     → sender.rs (resolve <broadcast>:9, one UDP datagram)
//! ```

pub mod mac;
pub mod packet;
pub mod sender;

pub use mac::{HardwareAddr, ParseMacError};
pub use packet::magic_packet;
pub use sender::{send_magic_packet, DryRunSender, UdpWakeSender, WakeSender, WolError, WOL_PORT};
