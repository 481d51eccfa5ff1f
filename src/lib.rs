//! Zero-copy views and builders for raw Ethernet frames.
//!
//! Every header type comes as a read-only view over a received buffer and,
//! except TCP, a builder that writes into a caller-owned buffer. Neither
//! copies or owns the bytes. Each layer is located from the one beneath it:
//!
//! - Ethernet II, ARP/RARP
//! - IPv4; options are skipped over via `ihl` but not decoded
//! - ICMP, UDP, TCP (fixed headers)
//! - Internet checksum, with the IPv4 pseudo-header as an opt-in
//! - A layer-walking [`dissect`] for received frames
//! - Blocking and tokio raw sockets to carry finished frames
//!
//! Checksums are never filled in implicitly: set every other field first,
//! then compute and store the checksum.

pub mod address;
pub mod arp;
pub mod buffer;
pub mod checksum;
pub mod dissect;
pub mod error;
pub mod ethernet;
pub mod icmp;
pub mod ip;
pub mod socket;
pub mod tcp;
pub mod udp;

pub use address::MacAddress;
pub use dissect::{dissect, Dissection, Network, Transport};
pub use error::{FrameError, Result};
pub use ethernet::{EthernetBuilder, EthernetProtocol, EthernetView};
pub use icmp::{IcmpBuilder, IcmpCode, IcmpType, IcmpView};
pub use ip::{IpBuilder, IpProtocol, IpView, Ipv4Flags};
pub use tcp::{TcpFlags, TcpView};
pub use udp::{UdpBuilder, UdpView};

/// Common interface of every view and builder.
pub trait FrameHeader {
    /// Position of this header in the frame buffer.
    fn offset(&self) -> usize;

    /// Header length in bytes. For IPv4 and TCP this is what the header's own
    /// length field claims.
    fn header_length(&self) -> usize;

    /// The header bytes, clamped to the buffer.
    fn as_bytes(&self) -> &[u8];

    /// Where the next layer starts.
    fn payload_offset(&self) -> usize {
        self.offset() + self.header_length()
    }
}

/// Headers that carry an Internet checksum.
pub trait Checksumable {
    /// The checksum the covered bytes should carry, with the checksum field
    /// itself read as zero.
    fn calculate_checksum(&self) -> u16;

    /// `true` if the stored checksum matches the covered bytes.
    fn verify_checksum(&self) -> bool;
}
