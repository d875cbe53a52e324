//! Link-layer (hardware) address parsing.
//!
//! Accepted forms, for 6-, 8- and 20-octet addresses:
//!
//! ```text
//! 00:00:5e:00:53:01
//! 00-00-5e-00-53-01
//! 0000.5e00.5301
//! 02:00:5e:10:00:00:00:01
//! 0000.0000.fe80.0000.0000.0000.0200.5e10.0000.0001
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Reason a string was rejected as a hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address {input:?}")]
pub struct ParseMacError {
    pub input: String,
}

/// A parsed hardware address of 6, 8 or 20 octets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HardwareAddr(Vec<u8>);

impl HardwareAddr {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_valid_octet_count(n: usize) -> bool {
    matches!(n, 6 | 8 | 20)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Two hex digits at the start of `s`, which must be followed by `sep` (or end).
fn octet(s: &[u8], sep: Option<u8>) -> Option<u8> {
    if s.len() < 2 {
        return None;
    }
    if s.len() > 2 && Some(s[2]) != sep {
        return None;
    }
    Some(hex_value(s[0])? << 4 | hex_value(s[1])?)
}

fn parse(s: &[u8]) -> Option<Vec<u8>> {
    if s.len() < 14 {
        return None;
    }

    if s[2] == b':' || s[2] == b'-' {
        if (s.len() + 1) % 3 != 0 {
            return None;
        }
        let n = (s.len() + 1) / 3;
        if !is_valid_octet_count(n) {
            return None;
        }
        let sep = s[2];
        (0..n).map(|i| octet(&s[i * 3..], Some(sep))).collect()
    } else if s[4] == b'.' {
        if (s.len() + 1) % 5 != 0 {
            return None;
        }
        let n = 2 * (s.len() + 1) / 5;
        if !is_valid_octet_count(n) {
            return None;
        }
        let mut out = Vec::with_capacity(n);
        for group in 0..n / 2 {
            let x = group * 5;
            out.push(octet(&s[x..x + 2], None)?);
            out.push(octet(&s[x + 2..], Some(b'.'))?);
        }
        Some(out)
    } else {
        None
    }
}

impl FromStr for HardwareAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s.as_bytes()).map(HardwareAddr).ok_or_else(|| ParseMacError {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
