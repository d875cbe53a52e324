//! Magic packet transmission over UDP.
//!
//! # Responsibilities
//! - Parse the hardware address and resolve the broadcast destination
//! - Send one datagram from a transient socket
//!
//! No acknowledgement is awaited: success means the datagram left this host.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};

use crate::wol::mac::{HardwareAddr, ParseMacError};
use crate::wol::packet::magic_packet;

/// Standard Wake-on-LAN destination port (discard service).
pub const WOL_PORT: u16 = 9;

/// Errors raised while building or transmitting a magic packet.
#[derive(Debug, Error)]
pub enum WolError {
    /// The hardware address text could not be parsed.
    #[error(transparent)]
    InvalidHardwareAddress(#[from] ParseMacError),

    /// The broadcast address could not be resolved to a UDP destination.
    #[error("invalid broadcast address {address:?}: {reason}")]
    InvalidBroadcastAddress { address: String, reason: String },

    /// A local UDP socket could not be created.
    #[error("failed to open UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    /// The datagram could not be written.
    #[error("failed to send magic packet to {destination}: {source}")]
    Send {
        destination: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl WolError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WolError::InvalidHardwareAddress(_) | WolError::InvalidBroadcastAddress { .. } => {
                "invalid_address"
            }
            WolError::Socket(_) | WolError::Send { .. } => "send_error",
        }
    }
}

/// Something that can deliver a wake request for a mac/broadcast pair.
#[async_trait]
pub trait WakeSender: Send + Sync {
    async fn send(&self, mac: &str, broadcast: &str) -> Result<(), WolError>;
}

/// Sends real magic packets to `<broadcast>:<port>`.
#[derive(Debug, Clone, Copy)]
pub struct UdpWakeSender {
    port: u16,
}

impl UdpWakeSender {
    pub fn new() -> Self {
        Self { port: WOL_PORT }
    }

    /// Target a non-standard port.
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for UdpWakeSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WakeSender for UdpWakeSender {
    async fn send(&self, mac: &str, broadcast: &str) -> Result<(), WolError> {
        send_magic_packet(mac, broadcast, self.port).await.map(|_| ())
    }
}

/// Logs the send instead of touching the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSender;

#[async_trait]
impl WakeSender for DryRunSender {
    async fn send(&self, mac: &str, broadcast: &str) -> Result<(), WolError> {
        tracing::warn!(mac = %mac, broadcast = %broadcast, "Dry run, magic packet not sent");
        Ok(())
    }
}

/// Join a host and port, bracketing IPv6 literals.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

async fn resolve_destination(broadcast: &str, port: u16) -> Result<SocketAddr, WolError> {
    let invalid = |reason: String| WolError::InvalidBroadcastAddress {
        address: broadcast.to_string(),
        reason,
    };

    if broadcast.is_empty() {
        return Err(invalid("empty address".to_string()));
    }

    let mut addrs = lookup_host(join_host_port(broadcast, port))
        .await
        .map_err(|e| invalid(e.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| invalid("no addresses resolved".to_string()))
}

/// Parse, resolve and send a single magic packet. Returns the destination.
pub async fn send_magic_packet(
    mac: &str,
    broadcast: &str,
    port: u16,
) -> Result<SocketAddr, WolError> {
    let addr: HardwareAddr = mac.parse()?;
    let destination = resolve_destination(broadcast, port).await?;
    let packet = magic_packet(&addr);

    let local: SocketAddr = match destination {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await.map_err(WolError::Socket)?;
    if destination.is_ipv4() {
        socket.set_broadcast(true).map_err(WolError::Socket)?;
    }

    socket
        .send_to(&packet, destination)
        .await
        .map_err(|source| WolError::Send {
            destination,
            source,
        })?;

    tracing::debug!(
        mac = %addr,
        destination = %destination,
        bytes = packet.len(),
        "Magic packet sent"
    );
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("192.168.1.255", 9), "192.168.1.255:9");
        assert_eq!(join_host_port("ff02::1", 9), "[ff02::1]:9");
    }

    #[tokio::test]
    async fn test_sends_magic_packet_to_destination() {
        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = sink.local_addr().unwrap().port();

        let sender = UdpWakeSender::with_port(port);
        sender.send("00:11:22:33:44:55", "127.0.0.1").await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), sink.recv_from(&mut buf))
            .await
            .expect("no datagram received")
            .unwrap();

        assert_eq!(len, 102);
        assert_eq!(&buf[..6], &[0xFF; 6]);
        assert_eq!(&buf[6..12], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(&buf[96..102], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[tokio::test]
    async fn test_invalid_mac_fails_before_send() {
        let err = send_magic_packet("not-a-mac", "10.0.0.255", WOL_PORT)
            .await
            .unwrap_err();
        assert!(matches!(err, WolError::InvalidHardwareAddress(_)));
        assert_eq!(err.kind(), "invalid_address");
    }

    #[tokio::test]
    async fn test_empty_broadcast_is_invalid() {
        let err = send_magic_packet("00:11:22:33:44:55", "", WOL_PORT)
            .await
            .unwrap_err();
        assert!(matches!(err, WolError::InvalidBroadcastAddress { .. }));
    }

    #[tokio::test]
    async fn test_dry_run_never_fails() {
        assert!(DryRunSender.send("anything", "anywhere").await.is_ok());
    }

    #[test]
    fn test_default_port() {
        assert_eq!(UdpWakeSender::default().port(), 9);
    }
}
