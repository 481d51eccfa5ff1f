//! ICMP (Internet Control Message Protocol) header view and builder.
//!
//! The `code` byte is only meaningful for destination-unreachable, redirect
//! and time-exceeded messages; every other type resolves its code to
//! [`IcmpCode::None`]. Echo messages carry an identifier and a sequence number
//! in the second header word, which is all that is modelled of it.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::buffer::{view_at, view_at_mut, FrameSlice, FrameSliceMut};
use crate::checksum::internet_checksum;
use crate::{Checksumable, FrameError, FrameHeader, Result};

pub const ICMP_HEADER_LEN: usize = 8;

const TYPE: usize = 0;
const CODE: usize = 1;
const CHECKSUM: usize = 2;
const ID: usize = 4;
const SEQUENCE: usize = 6;

/// ICMP message types as defined in RFC 792 and RFC 950.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IcmpType {
    /// Echo Request (Type 8)
    EchoRequest,
    /// Echo Reply (Type 0)
    EchoReply,
    /// Destination Unreachable (Type 3)
    Unreached,
    /// Redirect Message (Type 5)
    Redirect,
    /// Time Exceeded (Type 11)
    TimeExceeded,
    /// Information Request (Type 15)
    InfoRequest,
    /// Information Reply (Type 16)
    InfoReply,
    /// Timestamp Request (Type 13)
    TimeStamp,
    /// Timestamp Reply (Type 14)
    TimeStampReply,
    /// Parameter Problem (Type 12)
    ParameterProblem,
    /// Address Mask Request (Type 17)
    AddressMaskRequest,
    /// Address Mask Reply (Type 18)
    AddressMaskReply,
    Undefined,
}

impl IcmpType {
    pub fn from_wire(value: u8) -> Self {
        match value {
            8 => IcmpType::EchoRequest,
            0 => IcmpType::EchoReply,
            3 => IcmpType::Unreached,
            5 => IcmpType::Redirect,
            11 => IcmpType::TimeExceeded,
            15 => IcmpType::InfoRequest,
            16 => IcmpType::InfoReply,
            13 => IcmpType::TimeStamp,
            14 => IcmpType::TimeStampReply,
            12 => IcmpType::ParameterProblem,
            17 => IcmpType::AddressMaskRequest,
            18 => IcmpType::AddressMaskReply,
            _ => IcmpType::Undefined,
        }
    }

    pub fn to_wire(self) -> Option<u8> {
        match self {
            IcmpType::EchoRequest => Some(8),
            IcmpType::EchoReply => Some(0),
            IcmpType::Unreached => Some(3),
            IcmpType::Redirect => Some(5),
            IcmpType::TimeExceeded => Some(11),
            IcmpType::InfoRequest => Some(15),
            IcmpType::InfoReply => Some(16),
            IcmpType::TimeStamp => Some(13),
            IcmpType::TimeStampReply => Some(14),
            IcmpType::ParameterProblem => Some(12),
            IcmpType::AddressMaskRequest => Some(17),
            IcmpType::AddressMaskReply => Some(18),
            IcmpType::Undefined => None,
        }
    }

    pub fn is_echo(self) -> bool {
        matches!(self, IcmpType::EchoRequest | IcmpType::EchoReply)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IcmpType::EchoRequest => "Echo Request",
            IcmpType::EchoReply => "Echo Reply",
            IcmpType::Unreached => "Destination Unreachable",
            IcmpType::Redirect => "Redirect",
            IcmpType::TimeExceeded => "Time Exceeded",
            IcmpType::InfoRequest => "Information Request",
            IcmpType::InfoReply => "Information Reply",
            IcmpType::TimeStamp => "Timestamp Request",
            IcmpType::TimeStampReply => "Timestamp Reply",
            IcmpType::ParameterProblem => "Parameter Problem",
            IcmpType::AddressMaskRequest => "Address Mask Request",
            IcmpType::AddressMaskReply => "Address Mask Reply",
            IcmpType::Undefined => "Unknown",
        }
    }
}

impl fmt::Display for IcmpType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICMP codes. Which values are valid depends on the [`IcmpType`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IcmpCode {
    // Destination Unreachable
    NetUnreachable,
    HostUnreachable,
    ProtocolUnreachable,
    PortUnreachable,
    FragmentationNeeded,
    SourceRouteFailed,
    NetUnknown,
    HostUnknown,
    HostIsolated,
    NetProhibited,
    HostProhibited,
    NetUnreachableForTypeOfService,
    HostUnreachableForTypeOfService,
    PacketFiltered,
    PrecedenceViolation,
    PrecedenceCutOff,
    // Redirect
    RedirectNet,
    RedirectHost,
    RedirectNetForTypeOfService,
    RedirectHostForTypeOfService,
    // Time Exceeded
    TtlCountExceeded,
    FragmentReassemblyTimeExceeded,
    /// The message type carries no code.
    None,
    Undefined,
}

const UNREACHED_CODES: [IcmpCode; 16] = [
    IcmpCode::NetUnreachable,
    IcmpCode::HostUnreachable,
    IcmpCode::ProtocolUnreachable,
    IcmpCode::PortUnreachable,
    IcmpCode::FragmentationNeeded,
    IcmpCode::SourceRouteFailed,
    IcmpCode::NetUnknown,
    IcmpCode::HostUnknown,
    IcmpCode::HostIsolated,
    IcmpCode::NetProhibited,
    IcmpCode::HostProhibited,
    IcmpCode::NetUnreachableForTypeOfService,
    IcmpCode::HostUnreachableForTypeOfService,
    IcmpCode::PacketFiltered,
    IcmpCode::PrecedenceViolation,
    IcmpCode::PrecedenceCutOff,
];

const REDIRECT_CODES: [IcmpCode; 4] = [
    IcmpCode::RedirectNet,
    IcmpCode::RedirectHost,
    IcmpCode::RedirectNetForTypeOfService,
    IcmpCode::RedirectHostForTypeOfService,
];

const TIME_EXCEEDED_CODES: [IcmpCode; 2] = [
    IcmpCode::TtlCountExceeded,
    IcmpCode::FragmentReassemblyTimeExceeded,
];

/// Second-level table for `icmp_type`; `None` if the type carries no code.
fn code_table(icmp_type: IcmpType) -> Option<&'static [IcmpCode]> {
    match icmp_type {
        IcmpType::Unreached => Some(&UNREACHED_CODES),
        IcmpType::Redirect => Some(&REDIRECT_CODES),
        IcmpType::TimeExceeded => Some(&TIME_EXCEEDED_CODES),
        _ => None,
    }
}

impl IcmpCode {
    /// Decodes the code byte in the context of its message type.
    pub fn resolve(icmp_type: IcmpType, code: u8) -> Self {
        if icmp_type == IcmpType::Undefined {
            return IcmpCode::Undefined;
        }
        match code_table(icmp_type) {
            Some(table) => table.get(code as usize).copied().unwrap_or(IcmpCode::Undefined),
            None => IcmpCode::None,
        }
    }

    /// Wire value of this code under `icmp_type`, if it belongs there.
    pub fn to_wire(self, icmp_type: IcmpType) -> Option<u8> {
        match code_table(icmp_type) {
            Some(table) => table.iter().position(|c| *c == self).map(|i| i as u8),
            None if icmp_type != IcmpType::Undefined && self == IcmpCode::None => Some(0),
            None => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IcmpCode::NetUnreachable => "Network Unreachable",
            IcmpCode::HostUnreachable => "Host Unreachable",
            IcmpCode::ProtocolUnreachable => "Protocol Unreachable",
            IcmpCode::PortUnreachable => "Port Unreachable",
            IcmpCode::FragmentationNeeded => "Fragmentation Needed and Don't Fragment was Set",
            IcmpCode::SourceRouteFailed => "Source Route Failed",
            IcmpCode::NetUnknown => "Network Unknown",
            IcmpCode::HostUnknown => "Host Unknown",
            IcmpCode::HostIsolated => "Host Isolated",
            IcmpCode::NetProhibited => "Network Administratively Prohibited",
            IcmpCode::HostProhibited => "Host Administratively Prohibited",
            IcmpCode::NetUnreachableForTypeOfService => "Network Unreachable for Type of Service",
            IcmpCode::HostUnreachableForTypeOfService => "Host Unreachable for Type of Service",
            IcmpCode::PacketFiltered => "Packet Filtered",
            IcmpCode::PrecedenceViolation => "Precedence Violation",
            IcmpCode::PrecedenceCutOff => "Precedence Cut-off In Effect",
            IcmpCode::RedirectNet => "Redirect Network",
            IcmpCode::RedirectHost => "Redirect Host",
            IcmpCode::RedirectNetForTypeOfService => "Redirect Network for Type of Service",
            IcmpCode::RedirectHostForTypeOfService => "Redirect Host for Type of Service",
            IcmpCode::TtlCountExceeded => "TTL Count Exceeded",
            IcmpCode::FragmentReassemblyTimeExceeded => "Fragment Reassembly Time Exceeded",
            IcmpCode::None => "None",
            IcmpCode::Undefined => "Unknown",
        }
    }
}

impl fmt::Display for IcmpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn message_checksum(message: &[u8]) -> u16 {
    let mut scratch = message.to_vec();
    scratch[CHECKSUM..CHECKSUM + 2].fill(0);
    internet_checksum(&scratch)
}

/// Read-only ICMP header.
///
/// The message runs to the end of the buffer, or to the end of the IP
/// datagram when the view was derived from an [`IpView`](crate::ip::IpView).
#[derive(Debug, Clone, Copy)]
pub struct IcmpView<'a> {
    frame: FrameSlice<'a>,
}

impl<'a> IcmpView<'a> {
    pub fn new(buffer: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame: view_at(buffer, offset, ICMP_HEADER_LEN)?,
        })
    }

    pub(crate) fn from_slice(frame: FrameSlice<'a>) -> Self {
        Self { frame }
    }

    pub fn type_number(&self) -> u8 {
        self.frame.read_u8(TYPE)
    }

    pub fn icmp_type(&self) -> IcmpType {
        IcmpType::from_wire(self.type_number())
    }

    pub fn code_number(&self) -> u8 {
        self.frame.read_u8(CODE)
    }

    pub fn code(&self) -> IcmpCode {
        IcmpCode::resolve(self.icmp_type(), self.code_number())
    }

    pub fn checksum(&self) -> u16 {
        self.frame.read_u16(CHECKSUM)
    }

    /// Echo identifier; other types use these bytes differently.
    pub fn id(&self) -> u16 {
        self.frame.read_u16(ID)
    }

    /// Echo sequence number; other types use these bytes differently.
    pub fn sequence_number(&self) -> u16 {
        self.frame.read_u16(SEQUENCE)
    }

    /// Header and data.
    pub fn message(&self) -> &'a [u8] {
        self.frame.tail()
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.frame.tail()[ICMP_HEADER_LEN..]
    }
}

impl FrameHeader for IcmpView<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        ICMP_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.bytes(0, ICMP_HEADER_LEN)
    }
}

impl Checksumable for IcmpView<'_> {
    fn calculate_checksum(&self) -> u16 {
        message_checksum(self.message())
    }

    fn verify_checksum(&self) -> bool {
        internet_checksum(self.message()) == 0
    }
}

impl fmt::Display for IcmpView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ICMP header {{")?;
        writeln!(f, "\ttype={}", self.icmp_type())?;
        writeln!(f, "\tcode={}", self.code())?;
        writeln!(f, "\tcheck-sum={:#06x}", self.checksum())?;
        if self.icmp_type().is_echo() {
            writeln!(f, "\tid={}", self.id())?;
            writeln!(f, "\tsequence-number={}", self.sequence_number())?;
        }
        write!(f, "}}")
    }
}

/// Writes an ICMP header, and optionally its data, into a caller-owned buffer.
#[derive(Debug)]
pub struct IcmpBuilder<'a> {
    frame: FrameSliceMut<'a>,
    payload_len: usize,
}

impl<'a> IcmpBuilder<'a> {
    pub fn new(buffer: &'a mut [u8], offset: usize) -> Result<Self> {
        Ok(Self::from_slice(view_at_mut(buffer, offset, ICMP_HEADER_LEN)?))
    }

    pub(crate) fn from_slice(frame: FrameSliceMut<'a>) -> Self {
        Self {
            frame,
            payload_len: 0,
        }
    }

    /// Sets the type and re-checks the code already written.
    ///
    /// Code-less types get a zero code byte, as does a coded type replacing
    /// a code-less one. A code carried over from another coded type must
    /// also exist under the new type, otherwise nothing is written.
    pub fn set_type(&mut self, icmp_type: IcmpType) -> Result<&mut Self> {
        let value = icmp_type.to_wire().ok_or_else(|| {
            debug!("rejected icmp type {:?}", icmp_type);
            FrameError::UnsupportedValue("Undefined icmp type has no type number".to_string())
        })?;
        let code = match (code_table(icmp_type), self.view().code()) {
            (None, _) | (Some(_), IcmpCode::None | IcmpCode::Undefined) => 0,
            (Some(_), code) => code.to_wire(icmp_type).ok_or_else(|| {
                debug!("icmp code {:?} does not carry over to type {:?}", code, icmp_type);
                FrameError::UnsupportedValue(format!(
                    "icmp code {:?} is not valid for type {:?}, change the code first",
                    code, icmp_type
                ))
            })?,
        };
        self.frame.write_u8(TYPE, value);
        self.frame.write_u8(CODE, code);
        Ok(self)
    }

    /// Sets the code; it must belong to the type already written.
    pub fn set_code(&mut self, code: IcmpCode) -> Result<&mut Self> {
        let icmp_type = self.view().icmp_type();
        let value = code.to_wire(icmp_type).ok_or_else(|| {
            debug!("rejected icmp code {:?} for type {:?}", code, icmp_type);
            FrameError::UnsupportedValue(format!(
                "icmp code {:?} is not valid for type {:?}",
                code, icmp_type
            ))
        })?;
        self.frame.write_u8(CODE, value);
        Ok(self)
    }

    pub fn set_checksum(&mut self, checksum: u16) -> &mut Self {
        self.frame.write_u16(CHECKSUM, checksum);
        self
    }

    pub fn set_id(&mut self, id: u16) -> &mut Self {
        self.frame.write_u16(ID, id);
        self
    }

    pub fn set_sequence_number(&mut self, sequence: u16) -> &mut Self {
        self.frame.write_u16(SEQUENCE, sequence);
        self
    }

    /// Copies `payload` right after the header.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<&mut Self> {
        let required = self.frame.offset() + ICMP_HEADER_LEN + payload.len();
        if required > self.frame.capacity() {
            debug!("icmp payload of {} bytes does not fit", payload.len());
            return Err(FrameError::Overflow {
                required,
                capacity: self.frame.capacity(),
            });
        }
        self.frame.write_bytes(ICMP_HEADER_LEN, payload);
        self.payload_len = payload.len();
        Ok(self)
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Checksum over the header and the payload set so far, with the
    /// checksum field read as zero.
    pub fn default_checksum(&self) -> u16 {
        message_checksum(self.frame.as_slice().bytes(0, ICMP_HEADER_LEN + self.payload_len))
    }

    pub fn view(&self) -> IcmpView<'_> {
        IcmpView {
            frame: self.frame.as_slice(),
        }
    }
}

impl FrameHeader for IcmpBuilder<'_> {
    fn offset(&self) -> usize {
        self.frame.offset()
    }

    fn header_length(&self) -> usize {
        ICMP_HEADER_LEN
    }

    fn as_bytes(&self) -> &[u8] {
        self.frame.as_slice().bytes(0, ICMP_HEADER_LEN)
    }
}

impl fmt::Display for IcmpBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_request_ignores_code() {
        for code in [0u8, 3, 0xff] {
            let buffer = [8, code, 0, 0, 0, 1, 0, 2];
            let view = IcmpView::new(&buffer, 0).unwrap();
            assert_eq!(view.icmp_type(), IcmpType::EchoRequest);
            assert_eq!(view.code(), IcmpCode::None);
        }
    }

    #[test]
    fn test_code_tables() {
        assert_eq!(IcmpCode::resolve(IcmpType::Unreached, 3), IcmpCode::PortUnreachable);
        assert_eq!(IcmpCode::resolve(IcmpType::Unreached, 13), IcmpCode::PacketFiltered);
        assert_eq!(IcmpCode::resolve(IcmpType::Unreached, 15), IcmpCode::PrecedenceCutOff);
        assert_eq!(IcmpCode::resolve(IcmpType::Unreached, 16), IcmpCode::Undefined);
        assert_eq!(IcmpCode::resolve(IcmpType::Redirect, 1), IcmpCode::RedirectHost);
        assert_eq!(IcmpCode::resolve(IcmpType::Redirect, 4), IcmpCode::Undefined);
        assert_eq!(IcmpCode::resolve(IcmpType::TimeExceeded, 0), IcmpCode::TtlCountExceeded);
        assert_eq!(IcmpCode::resolve(IcmpType::TimeExceeded, 2), IcmpCode::Undefined);
        assert_eq!(IcmpCode::resolve(IcmpType::ParameterProblem, 1), IcmpCode::None);
        assert_eq!(IcmpCode::resolve(IcmpType::Undefined, 0), IcmpCode::Undefined);
    }

    #[test]
    fn test_unknown_type_is_undefined() {
        let buffer = [42, 0, 0, 0, 0, 0, 0, 0];
        let view = IcmpView::new(&buffer, 0).unwrap();
        assert_eq!(view.icmp_type(), IcmpType::Undefined);
        assert_eq!(view.code(), IcmpCode::Undefined);
    }

    #[test]
    fn test_id_and_sequence_are_independent() {
        let mut buffer = [0u8; ICMP_HEADER_LEN];
        let mut builder = IcmpBuilder::new(&mut buffer, 0).unwrap();
        builder
            .set_type(IcmpType::EchoRequest)
            .unwrap()
            .set_code(IcmpCode::None)
            .unwrap()
            .set_id(0x1234)
            .set_sequence_number(7);

        assert_eq!(builder.view().id(), 0x1234);
        assert_eq!(builder.view().sequence_number(), 7);
        assert_eq!(buffer, [8, 0, 0, 0, 0x12, 0x34, 0x00, 0x07]);
    }

    #[test]
    fn test_code_must_match_type() {
        let mut buffer = [0u8; ICMP_HEADER_LEN];
        let mut builder = IcmpBuilder::new(&mut buffer, 0).unwrap();
        builder.set_type(IcmpType::Unreached).unwrap();
        builder.set_code(IcmpCode::PortUnreachable).unwrap();
        assert_eq!(builder.view().code_number(), 3);

        assert!(matches!(
            builder.set_code(IcmpCode::RedirectHost),
            Err(FrameError::UnsupportedValue(_))
        ));
        assert!(builder.set_code(IcmpCode::None).is_err());
        assert_eq!(builder.view().code(), IcmpCode::PortUnreachable);

        builder.set_type(IcmpType::EchoReply).unwrap();
        assert!(builder.set_code(IcmpCode::PortUnreachable).is_err());
        assert!(builder.set_code(IcmpCode::None).is_ok());
        assert!(matches!(
            builder.set_type(IcmpType::Undefined),
            Err(FrameError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_type_change_revalidates_code() {
        let mut buffer = [0u8; ICMP_HEADER_LEN];
        let mut builder = IcmpBuilder::new(&mut buffer, 0).unwrap();
        builder.set_type(IcmpType::Unreached).unwrap();
        builder.set_code(IcmpCode::PortUnreachable).unwrap();

        // Port unreachable has no meaning under Redirect.
        assert!(matches!(
            builder.set_type(IcmpType::Redirect),
            Err(FrameError::UnsupportedValue(_))
        ));
        assert_eq!(builder.view().icmp_type(), IcmpType::Unreached);
        assert_eq!(builder.view().code(), IcmpCode::PortUnreachable);

        // Sharing a wire value with a time-exceeded code is not enough.
        builder.set_code(IcmpCode::HostUnreachable).unwrap();
        assert!(builder.set_type(IcmpType::TimeExceeded).is_err());

        builder.set_type(IcmpType::EchoRequest).unwrap();
        assert_eq!(builder.view().code_number(), 0);
        assert_eq!(builder.view().code(), IcmpCode::None);

        builder.set_type(IcmpType::Redirect).unwrap();
        assert_eq!(builder.view().code(), IcmpCode::RedirectNet);
        builder.set_code(IcmpCode::RedirectHost).unwrap();
        builder.set_type(IcmpType::Redirect).unwrap();
        assert_eq!(builder.view().code(), IcmpCode::RedirectHost);
    }

    #[test]
    fn test_payload_and_checksum() {
        let payload = b"Hello, World!";
        let mut buffer = [0u8; 32];
        let mut builder = IcmpBuilder::new(&mut buffer, 4).unwrap();
        builder
            .set_type(IcmpType::EchoRequest)
            .unwrap()
            .set_id(1)
            .set_sequence_number(1)
            .set_payload(payload)
            .unwrap();
        let checksum = builder.default_checksum();
        builder.set_checksum(checksum);
        assert_eq!(builder.payload_len(), payload.len());

        let end = 4 + ICMP_HEADER_LEN + payload.len();
        let view = IcmpView::new(&buffer[..end], 4).unwrap();
        assert!(view.verify_checksum());
        assert_eq!(view.payload(), payload);
        assert_eq!(view.calculate_checksum(), checksum);
    }

    #[test]
    fn test_payload_overflow() {
        let mut buffer = [0u8; 12];
        let mut builder = IcmpBuilder::new(&mut buffer, 0).unwrap();
        assert!(builder.set_payload(&[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            builder.set_payload(&[1, 2, 3, 4, 5]),
            Err(FrameError::Overflow { required: 13, capacity: 12 })
        ));
        assert_eq!(builder.payload_len(), 4);
    }

    #[test]
    fn test_type_and_code_display() {
        assert_eq!(IcmpType::Unreached.to_string(), "Destination Unreachable");
        assert_eq!(IcmpType::from_wire(42).to_string(), "Unknown");
        assert_eq!(
            IcmpCode::resolve(IcmpType::Unreached, 15).to_string(),
            "Precedence Cut-off In Effect"
        );
        assert_eq!(format!("{}", IcmpCode::None), "None");
    }

    #[test]
    fn test_display_echo() {
        let buffer = [0, 0, 0xab, 0xcd, 0, 9, 0, 3];
        let text = IcmpView::new(&buffer, 0).unwrap().to_string();
        assert!(text.contains("type=Echo Reply"));
        assert!(text.contains("code=None"));
        assert!(text.contains("id=9"));
        assert!(text.contains("sequence-number=3"));
    }
}
