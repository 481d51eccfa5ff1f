use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::{view_at, FrameSlice};
use crate::{FrameHeader, Result};

/// Header without options.
pub const TCP_HEADER_MIN_LEN: usize = 20;

const SOURCE_PORT: usize = 0;
const DESTINATION_PORT: usize = 2;
const SEQUENCE: usize = 4;
const ACKNOWLEDGMENT: usize = 8;
const DATA_OFFSET: usize = 12;
const FLAGS: usize = 13;
const WINDOW: usize = 14;
const CHECKSUM: usize = 16;
const URGENT_POINTER: usize = 18;

/// TCP control flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
}

impl TcpFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            fin: bits & 0b00000001 != 0,
            syn: bits & 0b00000010 != 0,
            rst: bits & 0b00000100 != 0,
            psh: bits & 0b00001000 != 0,
            ack: bits & 0b00010000 != 0,
            urg: bits & 0b00100000 != 0,
        }
    }

    pub fn as_u8(&self) -> u8 {
        let mut flags = 0u8;
        if self.fin { flags |= 0b00000001; }
        if self.syn { flags |= 0b00000010; }
        if self.rst { flags |= 0b00000100; }
        if self.psh { flags |= 0b00001000; }
        if self.ack { flags |= 0b00010000; }
        if self.urg { flags |= 0b00100000; }
        flags
    }
}

/// Read-only TCP header. There is no TCP builder.
#[derive(Debug, Clone, Copy)]
pub struct TcpView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> TcpView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, TCP_HEADER_MIN_LEN)?,
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

    pub fn sequence_number(&self) -> u32 {
        self.frame.read_u32(SEQUENCE)
    }

    pub fn acknowledgment_number(&self) -> u32 {
        self.frame.read_u32(ACKNOWLEDGMENT)
    }

    /// Header length in 32-bit words.
    pub fn data_offset(&self) -> u8 {
        self.frame.read_u8(DATA_OFFSET) >> 4
    }

    pub fn flags(&self) -> TcpFlags {
        TcpFlags::from_bits(self.frame.read_u8(FLAGS))
    }

    pub fn window_size(&self) -> u16 {
        self.frame.read_u16(WINDOW)
    }

    pub fn checksum(&self) -> u16 {
        self.frame.read_u16(CHECKSUM)
    }

    pub fn urgent_pointer(&self) -> u16 {
        self.frame.read_u16(URGENT_POINTER)
    }
}

impl FrameHeader for TcpView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    /// `data_offset * 4`, as claimed by the header.
    fn header_length(&self) -> usize {
        self.data_offset() as usize * 4
    }

    /// The fixed 20-byte part; options are not exposed.
    fn as_bytes(&self) -> &[u8] {
        self.frame.bytes(0, TCP_HEADER_MIN_LEN)
    }
}

impl fmt::Display for TcpView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = self.flags();
        writeln!(f, "TCP header {{")?;
        writeln!(f, "\tsource-port={}", self.source_port())?;
        writeln!(f, "\tdestination-port={}", self.destination_port())?;
        writeln!(f, "\tsequence-number={}", self.sequence_number())?;
        writeln!(f, "\tacknowledgment-number={}", self.acknowledgment_number())?;
        writeln!(f, "\theader-length={}", self.header_length())?;
        writeln!(f, "\turg={}", flags.urg)?;
        writeln!(f, "\tack={}", flags.ack)?;
        writeln!(f, "\tpsh={}", flags.psh)?;
        writeln!(f, "\trst={}", flags.rst)?;
        writeln!(f, "\tsyn={}", flags.syn)?;
        writeln!(f, "\tfin={}", flags.fin)?;
        writeln!(f, "\twindow-size={}", self.window_size())?;
        writeln!(f, "\tcheck-sum={:#06x}", self.checksum())?;
        writeln!(f, "\turgent-pointer={}", self.urgent_pointer())?;
        write!(f, "}}")
    }
}
