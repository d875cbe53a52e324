//! Magic packet construction.

use crate::wol::mac::HardwareAddr;

/// Number of `0xFF` bytes opening every magic packet.
pub const SYNC_STREAM_LEN: usize = 6;

/// Number of times the hardware address is repeated.
pub const ADDRESS_REPETITIONS: usize = 16;

/// Build the magic packet: six `0xFF` bytes then the address repeated 16 times.
pub fn magic_packet(addr: &HardwareAddr) -> Vec<u8> {
    let mac = addr.as_bytes();
    let mut packet = Vec::with_capacity(SYNC_STREAM_LEN + ADDRESS_REPETITIONS * mac.len());
    packet.extend_from_slice(&[0xFF; SYNC_STREAM_LEN]);
    for _ in 0..ADDRESS_REPETITIONS {
        packet.extend_from_slice(mac);
    }
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_packet_layout() {
        let addr: HardwareAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let packet = magic_packet(&addr);

        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xFF; 6]);
        for chunk in packet[6..].chunks(6) {
            assert_eq!(chunk, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        }
        assert_eq!(packet[6..].chunks(6).count(), 16);
    }

    #[test]
    fn test_long_address_repeats_whole_address() {
        let addr: HardwareAddr = "02:00:5e:10:00:00:00:01".parse().unwrap();
        let packet = magic_packet(&addr);
        assert_eq!(packet.len(), 6 + 16 * 8);
        assert_eq!(&packet[6..14], addr.as_bytes());
        assert_eq!(&packet[packet.len() - 8..], addr.as_bytes());
    }
}
