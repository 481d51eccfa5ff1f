//! Text and binary forms of MAC and IPv4 addresses.
//!
//! Parsing never fails loudly here: malformed text yields `None`. Builders
//! turn that `None` into a [`FrameError::Format`](crate::FrameError::Format).

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

pub const MAC_ADDRESS_LEN: usize = 6;
pub const IPV4_ADDRESS_LEN: usize = 4;

/// MAC address representation
#[derive(Debug, Clone, Copy, Hash, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct MacAddress([u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xff; MAC_ADDRESS_LEN]);

    pub fn new(addr: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(addr)
    }

    /// Copies the first six bytes of `data`; `None` if there are fewer.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; MAC_ADDRESS_LEN] = data.get(..MAC_ADDRESS_LEN)?.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn octets(&self) -> [u8; MAC_ADDRESS_LEN] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mac(s).ok_or_else(|| FrameError::Format(format!("invalid mac-address \"{}\"", s)))
    }
}

/// Parses the canonical `XX:XX:XX:XX:XX:XX` form (either case).
///
/// Exactly six colon-separated groups of exactly two hex digits; anything
/// else is `None`.
pub fn parse_mac(text: &str) -> Option<MacAddress> {
    let mut parsed = [0u8; MAC_ADDRESS_LEN];
    let mut groups = text.split(':');

    for octet in parsed.iter_mut() {
        let group = groups.next()?;
        if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        *octet = u8::from_str_radix(group, 16).ok()?;
    }

    if groups.next().is_some() {
        return None;
    }
    Some(MacAddress(parsed))
}

/// Lower-case, zero-padded colon-hex.
pub fn format_mac(addr: &MacAddress) -> String {
    addr.to_string()
}

/// Strict dotted-quad parsing: four decimal octets, nothing else.
pub fn parse_ipv4(text: &str) -> Option<Ipv4Addr> {
    text.parse().ok()
}

pub fn format_ipv4(addr: Ipv4Addr) -> String {
    addr.to_string()
}

pub(crate) fn ipv4_from_slice(data: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(data[0], data[1], data[2], data[3])
}
