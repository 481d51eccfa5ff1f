use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::address::{parse_mac, MacAddress};
use crate::arp::{ArpView, ARP_HEADER_LEN};
use crate::buffer::{view_at, view_at_mut, FrameSlice, FrameSliceMut};
use crate::ip::{IpBuilder, IpView, IP_HEADER_MIN_LEN};
use crate::{FrameError, FrameHeader, Result};

/// 6 (destination) + 6 (source) + 2 (ethertype)
pub const ETHERNET_HEADER_LEN: usize = 14;

const DESTINATION: usize = 0;
const SOURCE: usize = 6;
const ETHER_TYPE: usize = 12;

/// EtherType values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum EthernetProtocol {
    Ip,
    Arp,
    Rarp,
    Undefined,
}

impl EthernetProtocol {
    pub fn from_wire(value: u16) -> Self {
        match value {
            0x0800 => EthernetProtocol::Ip,
            0x0806 => EthernetProtocol::Arp,
            0x8035 => EthernetProtocol::Rarp,
            _ => EthernetProtocol::Undefined,
        }
    }

    pub fn to_wire(self) -> Option<u16> {
        match self {
            EthernetProtocol::Ip => Some(0x0800),
            EthernetProtocol::Arp => Some(0x0806),
            EthernetProtocol::Rarp => Some(0x8035),
            EthernetProtocol::Undefined => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EthernetProtocol::Ip => "IP",
            EthernetProtocol::Arp => "ARP",
            EthernetProtocol::Rarp => "RARP",
            EthernetProtocol::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for EthernetProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only Ethernet II header.
#[derive(Debug, Clone, Copy)]
pub struct EthernetView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> EthernetView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, ETHERNET_HEADER_LEN)?,
        })
    }

    pub fn destination(&self) -> MacAddress {
        read_mac(&self.frame, DESTINATION)
    }

    pub fn source(&self) -> MacAddress {
        read_mac(&self.frame, SOURCE)
    }

    /// Raw ethertype, host order.
    pub fn ether_type(&self) -> u16 {
        self.frame.read_u16(ETHER_TYPE)
    }

    pub fn protocol(&self) -> EthernetProtocol {
        EthernetProtocol::from_wire(self.ether_type())
    }

    /// The IPv4 header following this one.
    pub fn ip(&self) -> Result<IpView<'a>> {
        Ok(IpView::from_slice(self.frame.child(ETHERNET_HEADER_LEN, IP_HEADER_MIN_LEN)?))
    }

    /// The ARP/RARP header following this one.
    pub fn arp(&self) -> Result<ArpView<'a>> {
        Ok(ArpView::from_slice(self.frame.child(ETHERNET_HEADER_LEN, ARP_HEADER_LEN)?))
    }
}

fn read_mac(frame: &FrameSlice<'_>, at: usize) -> MacAddress {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(frame.bytes(at, 6));
    MacAddress::new(octets)
}

impl FrameHeader for EthernetView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        ETHERNET_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.bytes(0, ETHERNET_HEADER_LEN)
    }
}

impl fmt::Display for EthernetView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ethernet header {{")?;
        writeln!(f, "\tdestination-mac-address={}", self.destination())?;
        writeln!(f, "\tsource-mac-address={}", self.source())?;
        writeln!(f, "\tprotocol={}", self.protocol())?;
        write!(f, "}}")
    }
}

/// Writes an Ethernet II header into a caller-owned buffer.
#[derive(Debug)]
pub struct EthernetBuilder<'a> {
    frame: FrameSliceMut<'a>,
}

impl<'a> EthernetBuilder<'a> {
    pub fn new(buffer: &'a mut [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at_mut(buffer, offset, ETHERNET_HEADER_LEN)?,
        })
    }

    /// Sets the destination from `XX:XX:XX:XX:XX:XX` text.
    pub fn set_destination_mac(&mut self, mac: &str) -> Result<&mut Self> {
        let addr = parse_mac_field("destination", mac)?;
        Ok(self.set_destination(addr))
    }

    /// Sets the source from `XX:XX:XX:XX:XX:XX` text.
    pub fn set_source_mac(&mut self, mac: &str) -> Result<&mut Self> {
        let addr = parse_mac_field("source", mac)?;
        Ok(self.set_source(addr))
    }

    pub fn set_destination(&mut self, addr: MacAddress) -> &mut Self {
        self.frame.write_bytes(DESTINATION, addr.as_bytes());
        self
    }

    pub fn set_source(&mut self, addr: MacAddress) -> &mut Self {
        self.frame.write_bytes(SOURCE, addr.as_bytes());
        self
    }

    pub fn set_protocol(&mut self, protocol: EthernetProtocol) -> Result<&mut Self> {
        let value = protocol.to_wire().ok_or_else(|| {
            debug!("rejected ethernet protocol {:?}", protocol);
            FrameError::UnsupportedValue("Undefined ethernet protocol has no ethertype".to_string())
        })?;
        self.frame.write_u16(ETHER_TYPE, value);
        Ok(self)
    }

    /// Builder for the IPv4 header following this one.
    pub fn ip(&mut self) -> Result<IpBuilder<'_>> {
        Ok(IpBuilder::from_slice(self.frame.child(ETHERNET_HEADER_LEN, IP_HEADER_MIN_LEN)?))
    }

    /// Re-reads what has been written so far.
    pub fn view(&self) -> EthernetView<'_> {
        EthernetView {
            frame: self.frame.as_slice(),
        }
    }
}

fn parse_mac_field(field: &str, text: &str) -> Result<MacAddress> {
    parse_mac(text).ok_or_else(|| {
        debug!("rejected {} mac-address {:?}", field, text);
        FrameError::Format(format!(
            "could not convert {} mac-address \"{}\", expected XX:XX:XX:XX:XX:XX",
            field, text
        ))
    })
}

impl FrameHeader for EthernetBuilder<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        ETHERNET_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.as_slice().bytes(0, ETHERNET_HEADER_LEN)
    }
}

impl fmt::Display for EthernetBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}
