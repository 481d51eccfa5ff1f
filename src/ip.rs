use std::fmt;
use std::net::Ipv4Addr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::address::{ipv4_from_slice, parse_ipv4};
use crate::buffer::{view_at, view_at_mut, FrameSlice, FrameSliceMut};
use crate::checksum::internet_checksum;
use crate::icmp::{IcmpBuilder, IcmpView, ICMP_HEADER_LEN};
use crate::tcp::{TcpView, TCP_HEADER_MIN_LEN};
use crate::udp::{UdpBuilder, UdpView, UDP_HEADER_LEN};
use crate::{Checksumable, FrameError, FrameHeader, Result};

/// 5 32-bit words, no options.
pub const IP_HEADER_MIN_LEN: usize = 20;
/// 15 32-bit words, the largest `ihl` can express.
pub const IP_HEADER_MAX_LEN: usize = 60;

pub const MAX_FRAGMENT_OFFSET: u16 = 8191;
pub const DEFAULT_TTL: u8 = 64;
pub const DEFAULT_TOS: u8 = 0;
pub const DEFAULT_ID: u16 = 0;

const VERSION_IHL: usize = 0;
const TOS: usize = 1;
const TOTAL_LENGTH: usize = 2;
const ID: usize = 4;
const FLAGS_FRAGMENT: usize = 6;
const TTL: usize = 8;
const PROTOCOL: usize = 9;
const CHECKSUM: usize = 10;
const SOURCE: usize = 12;
const DESTINATION: usize = 16;

/// IP Protocol Numbers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
    Undefined,
}

impl IpProtocol {
    pub fn from_wire(value: u8) -> Self {
        match value {
            6 => IpProtocol::Tcp,
            17 => IpProtocol::Udp,
            1 => IpProtocol::Icmp,
            _ => IpProtocol::Undefined,
        }
    }

    pub fn to_wire(self) -> Option<u8> {
        match self {
            IpProtocol::Tcp => Some(6),
            IpProtocol::Udp => Some(17),
            IpProtocol::Icmp => Some(1),
            IpProtocol::Undefined => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IpProtocol::Tcp => "TCP",
            IpProtocol::Udp => "UDP",
            IpProtocol::Icmp => "ICMP",
            IpProtocol::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IPv4 header flags, the top three bits of the fragment field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Ipv4Flags {
    pub reserved: bool,
    pub dont_fragment: bool,
    pub more_fragments: bool,
}

impl Ipv4Flags {
    pub fn new(dont_fragment: bool, more_fragments: bool) -> Self {
        Self {
            reserved: false,
            dont_fragment,
            more_fragments,
        }
    }

    pub fn dont_fragment() -> Self {
        Self::new(true, false)
    }

    pub fn more_fragments() -> Self {
        Self::new(false, true)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            reserved: bits & 0b100 != 0,
            dont_fragment: bits & 0b010 != 0,
            more_fragments: bits & 0b001 != 0,
        }
    }

    pub fn as_u8(&self) -> u8 {
        let mut flags = 0u8;
        if self.reserved { flags |= 0b100; }
        if self.dont_fragment { flags |= 0b010; }
        if self.more_fragments { flags |= 0b001; }
        flags
    }
}

/// Checksum of an IPv4 header with its checksum field read as zero.
fn header_checksum(header: &[u8]) -> u16 {
    let mut scratch = [0u8; IP_HEADER_MAX_LEN];
    let len = header.len().min(IP_HEADER_MAX_LEN);
    scratch[..len].copy_from_slice(&header[..len]);
    if len >= CHECKSUM + 2 {
        scratch[CHECKSUM] = 0;
        scratch[CHECKSUM + 1] = 0;
    }
    internet_checksum(&scratch[..len])
}

fn invalid_ihl(ihl: u8) -> FrameError {
    debug!("ip header length field ihl={} cannot locate the next layer", ihl);
    FrameError::InvalidHeaderLength {
        layer: "IP",
        length: ihl as usize * 4,
    }
}

/// Read-only IPv4 header.
///
/// Only the fixed 20 bytes are checked at construction. The `ihl` field is
/// untrusted: layers above IP are located through it, and that lookup fails
/// with [`FrameError::InvalidHeaderLength`] or [`FrameError::Bounds`] instead
/// of reading past the buffer.
#[derive(Debug, Clone, Copy)]
pub struct IpView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> IpView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, IP_HEADER_MIN_LEN)?,
        })
    }

    pub(crate) fn from_slice(frame: FrameSlice<'a>) -> Self {
        Self { frame }
    }

    pub fn version(&self) -> u8 {
        self.frame.read_u8(VERSION_IHL) >> 4
    }

    /// Header length in 32-bit words.
    pub fn ihl(&self) -> u8 {
        self.frame.read_u8(VERSION_IHL) & 0x0f
    }

    pub fn type_of_service(&self) -> u8 {
        self.frame.read_u8(TOS)
    }

    pub fn total_length(&self) -> u16 {
        self.frame.read_u16(TOTAL_LENGTH)
    }

    pub fn id(&self) -> u16 {
        self.frame.read_u16(ID)
    }

    pub fn flags(&self) -> Ipv4Flags {
        Ipv4Flags::from_bits((self.frame.read_u16(FLAGS_FRAGMENT) >> 13) as u8)
    }

    pub fn fragment_offset(&self) -> u16 {
        self.frame.read_u16(FLAGS_FRAGMENT) & 0x1fff
    }

    pub fn ttl(&self) -> u8 {
        self.frame.read_u8(TTL)
    }

    pub fn protocol_number(&self) -> u8 {
        self.frame.read_u8(PROTOCOL)
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from_wire(self.protocol_number())
    }

    pub fn checksum(&self) -> u16 {
        self.frame.read_u16(CHECKSUM)
    }

    pub fn source(&self) -> Ipv4Addr {
        ipv4_from_slice(self.frame.bytes(SOURCE, 4))
    }

    pub fn destination(&self) -> Ipv4Addr {
        ipv4_from_slice(self.frame.bytes(DESTINATION, 4))
    }

    /// Buffer index one past the last byte of this datagram.
    ///
    /// Taken from the total length field and clamped to the buffer. A total
    /// length shorter than the header (offloaded captures report zero) is
    /// ignored in favour of the buffer end.
    pub fn datagram_end(&self) -> usize {
        let buffer_end = self.frame.buffer().len();
        let total = self.total_length() as usize;
        if total < self.header_length() {
            return buffer_end;
        }
        (self.frame.offset() + total).min(buffer_end)
    }

    /// Bytes after the header up to the end of the datagram.
    pub fn payload(&self) -> &'a [u8] {
        let buffer = self.frame.buffer();
        let end = self.datagram_end();
        let start = self.payload_offset().min(end);
        &buffer[start..end]
    }

    fn upper_layer(&self, header_len: usize) -> Result<FrameSlice<'a>> {
        let ihl = self.ihl();
        if (ihl as usize) * 4 < IP_HEADER_MIN_LEN {
            return Err(invalid_ihl(ihl));
        }
        self.frame
            .truncated(self.datagram_end(), IP_HEADER_MIN_LEN)
            .child(self.header_length(), header_len)
    }

    pub fn icmp(&self) -> Result<IcmpView<'a>> {
        Ok(IcmpView::from_slice(self.upper_layer(ICMP_HEADER_LEN)?))
    }

    pub fn udp(&self) -> Result<UdpView<'a>> {
        Ok(UdpView::from_slice(self.upper_layer(UDP_HEADER_LEN)?))
    }

    pub fn tcp(&self) -> Result<TcpView<'a>> {
        Ok(TcpView::from_slice(self.upper_layer(TCP_HEADER_MIN_LEN)?))
    }
}

impl FrameHeader for IpView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        self.ihl() as usize * 4
    }

    /// The header as far as the buffer holds it.
    fn as_bytes(&self) -> &[u8] {
        let len = self.header_length().min(self.frame.tail().len());
        self.frame.bytes(0, len)
    }
}

impl Checksumable for IpView<'_> {
    fn calculate_checksum(&self) -> u16 {
        header_checksum(self.as_bytes())
    }

    fn verify_checksum(&self) -> bool {
        self.header_length() >= IP_HEADER_MIN_LEN
            && self.as_bytes().len() == self.header_length()
            && internet_checksum(self.as_bytes()) == 0
    }
}

impl fmt::Display for IpView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = self.flags();
        writeln!(f, "IP header {{")?;
        writeln!(f, "\tversion={}", self.version())?;
        writeln!(f, "\tprotocol={}", self.protocol())?;
        writeln!(f, "\tid={}", self.id())?;
        writeln!(
            f,
            "\tflags=[DF={}, MF={}]",
            flags.dont_fragment as u8, flags.more_fragments as u8
        )?;
        writeln!(f, "\tfragment-offset={}", self.fragment_offset())?;
        writeln!(f, "\tsource-ip-address={}", self.source())?;
        writeln!(f, "\tdestination-ip-address={}", self.destination())?;
        writeln!(f, "\tttl={}", self.ttl())?;
        writeln!(f, "\tcheck-sum={:#06x}", self.checksum())?;
        writeln!(f, "\ttype-of-service={}", self.type_of_service())?;
        writeln!(f, "\ttotal-length={}", self.total_length())?;
        writeln!(f, "\theader-length={}", self.header_length())?;
        write!(f, "}}")
    }
}

/// Writes an IPv4 header into a caller-owned buffer.
///
/// The header checksum is never filled in implicitly. Set every other field,
/// then `set_checksum(builder.default_checksum())`.
#[derive(Debug)]
pub struct IpBuilder<'a> {
    frame: FrameSliceMut<'a>,
}

impl<'a> IpBuilder<'a> {
    pub fn new(buffer: &'a mut [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at_mut(buffer, offset, IP_HEADER_MIN_LEN)?,
        })
    }

    pub(crate) fn from_slice(frame: FrameSliceMut<'a>) -> Self {
        Self { frame }
    }

    /// Version 4, 20-byte header, zero TOS and id, don't-fragment, TTL 64.
    pub fn apply_defaults(&mut self) -> &mut Self {
        self.frame.write_u8(VERSION_IHL, (4 << 4) | 5);
        self.frame.write_u8(TOS, DEFAULT_TOS);
        self.frame.write_u16(ID, DEFAULT_ID);
        self.frame
            .write_u16(FLAGS_FRAGMENT, (Ipv4Flags::dont_fragment().as_u8() as u16) << 13);
        self.frame.write_u8(TTL, DEFAULT_TTL);
        self
    }

    pub fn set_version(&mut self, version: u8) -> Result<&mut Self> {
        if version > 0x0f {
            debug!("rejected ip version {}", version);
            return Err(FrameError::Range {
                field: "version",
                value: version as u32,
                max: 0x0f,
            });
        }
        let ihl = self.frame.as_slice().read_u8(VERSION_IHL) & 0x0f;
        self.frame.write_u8(VERSION_IHL, (version << 4) | ihl);
        Ok(self)
    }

    /// Stores `length / 4` in `ihl`.
    ///
    /// The length must be a multiple of four between 20 and 60 bytes, and the
    /// buffer must hold that much header.
    pub fn set_header_length_in_bytes(&mut self, length: usize) -> Result<&mut Self> {
        if length % 4 != 0 || !(IP_HEADER_MIN_LEN..=IP_HEADER_MAX_LEN).contains(&length) {
            debug!("rejected ip header length {}", length);
            return Err(FrameError::Range {
                field: "header length",
                value: length as u32,
                max: IP_HEADER_MAX_LEN as u32,
            });
        }
        let available = self.frame.capacity() - self.frame.offset();
        if length > available {
            return Err(FrameError::Bounds {
                offset: self.frame.offset(),
                required: length,
                available,
            });
        }
        let version = self.frame.as_slice().read_u8(VERSION_IHL) & 0xf0;
        self.frame.write_u8(VERSION_IHL, version | (length / 4) as u8);
        Ok(self)
    }

    pub fn set_type_of_service(&mut self, tos: u8) -> &mut Self {
        self.frame.write_u8(TOS, tos);
        self
    }

    /// Header plus payload, in bytes.
    pub fn set_total_length(&mut self, length: u16) -> &mut Self {
        self.frame.write_u16(TOTAL_LENGTH, length);
        self
    }

    pub fn set_id(&mut self, id: u16) -> &mut Self {
        self.frame.write_u16(ID, id);
        self
    }

    /// Packs `flags` into the top three bits and `offset` into the low 13.
    pub fn set_fragment_offset(&mut self, flags: Ipv4Flags, offset: u16) -> Result<&mut Self> {
        if offset > MAX_FRAGMENT_OFFSET {
            debug!("rejected ip fragment offset {}", offset);
            return Err(FrameError::Range {
                field: "fragment offset",
                value: offset as u32,
                max: MAX_FRAGMENT_OFFSET as u32,
            });
        }
        let value = ((flags.as_u8() as u16) << 13) | (offset & 0x1fff);
        self.frame.write_u16(FLAGS_FRAGMENT, value);
        Ok(self)
    }

    pub fn set_ttl(&mut self, ttl: u8) -> &mut Self {
        self.frame.write_u8(TTL, ttl);
        self
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) -> Result<&mut Self> {
        let value = protocol.to_wire().ok_or_else(|| {
            debug!("rejected ip protocol {:?}", protocol);
            FrameError::UnsupportedValue("Undefined ip protocol has no protocol number".to_string())
        })?;
        self.frame.write_u8(PROTOCOL, value);
        Ok(self)
    }

    pub fn set_checksum(&mut self, checksum: u16) -> &mut Self {
        self.frame.write_u16(CHECKSUM, checksum);
        self
    }

    pub fn set_source(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.frame.write_bytes(SOURCE, &addr.octets());
        self
    }

    pub fn set_destination(&mut self, addr: Ipv4Addr) -> &mut Self {
        self.frame.write_bytes(DESTINATION, &addr.octets());
        self
    }

    /// Sets the source from dotted-quad text.
    pub fn set_source_ip(&mut self, addr: &str) -> Result<&mut Self> {
        let addr = parse_ip_field("source", addr)?;
        Ok(self.set_source(addr))
    }

    /// Sets the destination from dotted-quad text.
    pub fn set_destination_ip(&mut self, addr: &str) -> Result<&mut Self> {
        let addr = parse_ip_field("destination", addr)?;
        Ok(self.set_destination(addr))
    }

    /// Checksum over exactly the header bytes, with the checksum field read as zero.
    pub fn default_checksum(&self) -> u16 {
        header_checksum(self.view().as_bytes())
    }

    fn upper_layer(&mut self, header_len: usize) -> Result<FrameSliceMut<'_>> {
        let ihl = self.frame.as_slice().read_u8(VERSION_IHL) & 0x0f;
        if (ihl as usize) * 4 < IP_HEADER_MIN_LEN {
            return Err(invalid_ihl(ihl));
        }
        self.frame.child(ihl as usize * 4, header_len)
    }

    /// Builder for the ICMP header following this one; `ihl` must already be set.
    pub fn icmp(&mut self) -> Result<IcmpBuilder<'_>> {
        Ok(IcmpBuilder::from_slice(self.upper_layer(ICMP_HEADER_LEN)?))
    }

    /// Builder for the UDP header following this one; `ihl` must already be set.
    pub fn udp(&mut self) -> Result<UdpBuilder<'_>> {
        Ok(UdpBuilder::from_slice(self.upper_layer(UDP_HEADER_LEN)?))
    }

    pub fn view(&self) -> IpView<'_> {
        IpView {
            frame: self.frame.as_slice(),
        }
    }
}

fn parse_ip_field(field: &str, text: &str) -> Result<Ipv4Addr> {
    parse_ipv4(text).ok_or_else(|| {
        debug!("rejected {} ip-address {:?}", field, text);
        FrameError::Format(format!("could not set {} ip-address \"{}\", invalid ip-address", field, text))
    })
}

impl FrameHeader for IpBuilder<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        self.view().header_length()
    }

    fn as_bytes(&self) -> &[u8] {
        let len = self.header_length().min(self.frame.capacity() - self.frame.offset());
        self.frame.as_slice().bytes(0, len)
    }
}

impl Checksumable for IpBuilder<'_> {
    fn calculate_checksum(&self) -> u16 {
        self.default_checksum()
    }

    fn verify_checksum(&self) -> bool {
        self.view().verify_checksum()
    }
}

impl fmt::Display for IpBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}
