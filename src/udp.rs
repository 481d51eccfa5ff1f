//! UDP (User Datagram Protocol) header view and builder.

use std::fmt;
use std::net::Ipv4Addr;

use log::debug;

use crate::buffer::{view_at, view_at_mut, FrameSlice, FrameSliceMut};
use crate::checksum::{internet_checksum, pseudo_header_checksum};
use crate::{Checksumable, FrameError, FrameHeader, Result};

/// Source port, destination port, length and checksum, two bytes each.
pub const UDP_HEADER_LEN: usize = 8;

const PROTOCOL_NUMBER: u8 = 17;

const SOURCE_PORT: usize = 0;
const DESTINATION_PORT: usize = 2;
const LENGTH: usize = 4;
const CHECKSUM: usize = 6;

fn zeroed_checksum(datagram: &[u8]) -> Vec<u8> {
    let mut scratch = datagram.to_vec();
    scratch[CHECKSUM..CHECKSUM + 2].fill(0);
    scratch
}

/// Read-only UDP header.
#[derive(Debug, Clone, Copy)]
pub struct UdpView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> UdpView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, UDP_HEADER_LEN)?,
        })
    }

    pub(crate) fn from_slice(frame: FrameSlice<'a>) -> Self {
        Self { frame }
    }

    pub fn source_port(&self) -> u16 {
        self.frame.read_u16(SOURCE_PORT)
    }

    pub fn destination_port(&self) -> u16 {
        self.frame.read_u16(DESTINATION_PORT)
    }

    /// Header plus payload, as claimed by the sender.
    pub fn length(&self) -> u16 {
        self.frame.read_u16(LENGTH)
    }

    pub fn checksum(&self) -> u16 {
        self.frame.read_u16(CHECKSUM)
    }

    /// Header and payload, per the length field, clamped to the buffer.
    pub fn datagram(&self) -> &'a [u8] {
        let tail = self.frame.tail();
        let len = (self.length() as usize).clamp(UDP_HEADER_LEN, tail.len());
        &tail[..len]
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.datagram()[UDP_HEADER_LEN..]
    }

    /// Verifies against the RFC 768 checksum, pseudo-header included.
    pub fn verify_transport_checksum(&self, src: Ipv4Addr, dst: Ipv4Addr) -> bool {
        self.checksum() == 0 || pseudo_header_checksum(src, dst, PROTOCOL_NUMBER, self.datagram()) == 0
    }
}

impl FrameHeader for UdpView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        UDP_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.bytes(0, UDP_HEADER_LEN)
    }
}

/// Header plus payload only, no pseudo-header. A zero checksum means the
/// sender did not compute one and always verifies.
impl Checksumable for UdpView<'_> {
    fn calculate_checksum(&self) -> u16 {
        internet_checksum(&zeroed_checksum(self.datagram()))
    }

    fn verify_checksum(&self) -> bool {
        self.checksum() == 0 || internet_checksum(self.datagram()) == 0
    }
}

impl fmt::Display for UdpView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "UDP header {{")?;
        writeln!(f, "\tsource-port={}", self.source_port())?;
        writeln!(f, "\tdestination-port={}", self.destination_port())?;
        writeln!(f, "\tlength={}", self.length())?;
        writeln!(f, "\tcheck-sum={:#06x}", self.checksum())?;
        write!(f, "}}")
    }
}

/// Writes a UDP header and payload into a caller-owned buffer.
///
/// The length and checksum fields are never filled in implicitly; set them
/// once the payload is in place.
#[derive(Debug)]
pub struct UdpBuilder<'a> {
    frame: FrameSliceMut<'a>,
    payload_len: usize,
}

impl<'a> UdpBuilder<'a> {
    pub fn new(buffer: &'a mut [u8], offset: usize) -> Result<Self> {
        Ok(Self::from_slice(view_at_mut(buffer, offset, UDP_HEADER_LEN)?))
    }

    pub(crate) fn from_slice(frame: FrameSliceMut<'a>) -> Self {
        Self {
            frame,
            payload_len: 0,
        }
    }

    pub fn set_source_port(&mut self, port: u16) -> &mut Self {
        self.frame.write_u16(SOURCE_PORT, port);
        self
    }

    pub fn set_destination_port(&mut self, port: u16) -> &mut Self {
        self.frame.write_u16(DESTINATION_PORT, port);
        self
    }

    pub fn set_length(&mut self, length: u16) -> &mut Self {
        self.frame.write_u16(LENGTH, length);
        self
    }

    pub fn set_checksum(&mut self, checksum: u16) -> &mut Self {
        self.frame.write_u16(CHECKSUM, checksum);
        self
    }

    /// Copies `payload` right after the header and remembers its size.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<&mut Self> {
        let required = self.frame.offset() + UDP_HEADER_LEN + payload.len();
        if required > self.frame.capacity() {
            debug!("udp payload of {} bytes does not fit", payload.len());
            return Err(FrameError::Overflow {
                required,
                capacity: self.frame.capacity(),
            });
        }
        self.frame.write_bytes(UDP_HEADER_LEN, payload);
        self.payload_len = payload.len();
        Ok(self)
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Header length plus recorded payload size, for [`set_length`](Self::set_length).
    pub fn datagram_len(&self) -> usize {
        UDP_HEADER_LEN + self.payload_len
    }

    fn datagram(&self) -> Vec<u8> {
        zeroed_checksum(self.frame.as_slice().bytes(0, self.datagram_len()))
    }

    /// Internet checksum from the start of the header through the end of
    /// the payload, checksum field read as zero.
    pub fn default_checksum(&self) -> u16 {
        internet_checksum(&self.datagram())
    }

    /// RFC 768 checksum, IPv4 pseudo-header included.
    ///
    /// A computed value of zero is sent as `0xffff`.
    pub fn transport_checksum(&self, src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
        match pseudo_header_checksum(src, dst, PROTOCOL_NUMBER, &self.datagram()) {
            0 => 0xffff,
            checksum => checksum,
        }
    }

    pub fn view(&self) -> UdpView<'_> {
        UdpView {
            frame: self.frame.as_slice(),
        }
    }
}

impl FrameHeader for UdpBuilder<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        UDP_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.as_slice().bytes(0, UDP_HEADER_LEN)
    }
}

impl fmt::Display for UdpBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}
