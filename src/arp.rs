//! ARP (Address Resolution Protocol) header view.
//!
//! Only the Ethernet/IPv4 shape is modelled: six-byte hardware addresses and
//! four-byte protocol addresses, 28 bytes in total.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::address::{ipv4_from_slice, MacAddress};
use crate::buffer::{view_at, FrameSlice};
use crate::ethernet::EthernetProtocol;
use crate::{FrameHeader, Result};

/// 2+2+1+1+2+6+4+6+4
pub const ARP_HEADER_LEN: usize = 28;

const HARDWARE_TYPE: usize = 0;
const PROTOCOL_TYPE: usize = 2;
const HARDWARE_LEN: usize = 4;
const PROTOCOL_LEN: usize = 5;
const OPCODE: usize = 6;
const SENDER_MAC: usize = 8;
const SENDER_IP: usize = 14;
const TARGET_MAC: usize = 18;
const TARGET_IP: usize = 24;

/// ARP hardware types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HardwareType {
    /// Wire value 1
    Arp,
    /// Wire value 0
    Rarp,
    Undefined,
}

impl HardwareType {
    pub fn from_wire(value: u16) -> Self {
        match value {
            1 => HardwareType::Arp,
            0 => HardwareType::Rarp,
            _ => HardwareType::Undefined,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HardwareType::Arp => "ARP",
            HardwareType::Rarp => "RARP",
            HardwareType::Undefined => "Undefined",
        }
    }
}

/// ARP operation codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArpOpcode {
    ArpRequest,
    ArpReply,
    RArpRequest,
    RArpReply,
    InArpRequest,
    InArpReply,
    Undefined,
}

impl ArpOpcode {
    pub fn from_wire(value: u16) -> Self {
        match value {
            1 => ArpOpcode::ArpRequest,
            2 => ArpOpcode::ArpReply,
            3 => ArpOpcode::RArpRequest,
            4 => ArpOpcode::RArpReply,
            8 => ArpOpcode::InArpRequest,
            9 => ArpOpcode::InArpReply,
            _ => ArpOpcode::Undefined,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArpOpcode::ArpRequest => "ArpRequest",
            ArpOpcode::ArpReply => "ArpReply",
            ArpOpcode::RArpRequest => "RArpRequest",
            ArpOpcode::RArpReply => "RArpReply",
            ArpOpcode::InArpRequest => "InArpRequest",
            ArpOpcode::InArpReply => "InArpReply",
            ArpOpcode::Undefined => "Undefined",
        }
    }
}

/// Read-only ARP header.
#[derive(Debug, Clone, Copy)]
pub struct ArpView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> ArpView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, ARP_HEADER_LEN)?,
        })
    }

    pub(crate) fn from_slice(frame: FrameSlice<'a>) -> Self {
        Self { frame }
    }

    pub fn hardware_type(&self) -> HardwareType {
        HardwareType::from_wire(self.frame.read_u16(HARDWARE_TYPE))
    }

    /// Raw protocol type; uses ethertype numbering.
    pub fn protocol_type(&self) -> u16 {
        self.frame.read_u16(PROTOCOL_TYPE)
    }

    pub fn protocol(&self) -> EthernetProtocol {
        EthernetProtocol::from_wire(self.protocol_type())
    }

    pub fn hardware_length(&self) -> u8 {
        self.frame.read_u8(HARDWARE_LEN)
    }

    pub fn protocol_length(&self) -> u8 {
        self.frame.read_u8(PROTOCOL_LEN)
    }

    pub fn opcode(&self) -> ArpOpcode {
        ArpOpcode::from_wire(self.frame.read_u16(OPCODE))
    }

    pub fn sender_mac(&self) -> MacAddress {
        self.mac_at(SENDER_MAC)
    }

    pub fn sender_ip(&self) -> Ipv4Addr {
        ipv4_from_slice(self.frame.bytes(SENDER_IP, 4))
    }

    pub fn target_mac(&self) -> MacAddress {
        self.mac_at(TARGET_MAC)
    }

    pub fn target_ip(&self) -> Ipv4Addr {
        ipv4_from_slice(self.frame.bytes(TARGET_IP, 4))
    }

    fn mac_at(&self, at: usize) -> MacAddress {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(self.frame.bytes(at, 6));
        MacAddress::new(octets)
    }
}

impl FrameHeader for ArpView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        ARP_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.bytes(0, ARP_HEADER_LEN)
    }
}

impl fmt::Display for ArpView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ARP header {{")?;
        writeln!(f, "\thardware-type={}", self.hardware_type().as_str())?;
        writeln!(f, "\tprotocol-type={}", self.protocol())?;
        writeln!(f, "\thardware-length={}", self.hardware_length())?;
        writeln!(f, "\tprotocol-length={}", self.protocol_length())?;
        writeln!(f, "\topcode={}", self.opcode().as_str())?;
        writeln!(f, "\tsender-mac-address={}", self.sender_mac())?;
        writeln!(f, "\tsender-ip-address={}", self.sender_ip())?;
        writeln!(f, "\ttarget-mac-address={}", self.target_mac())?;
        writeln!(f, "\ttarget-ip-address={}", self.target_ip())?;
        write!(f, "}}")
    }
}
