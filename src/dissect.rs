//! Walks a received frame layer by layer.
//!
//! The walk stops quietly at the first protocol it does not know; only a
//! header that does not fit in the buffer is an error.

use std::fmt;

use log::trace;

use crate::arp::ArpView;
use crate::ethernet::{EthernetProtocol, EthernetView};
use crate::icmp::IcmpView;
use crate::ip::{IpProtocol, IpView};
use crate::tcp::TcpView;
use crate::udp::UdpView;
use crate::Result;

/// Layer above Ethernet.
#[derive(Debug, Clone, Copy)]
pub enum Network<'a> {
    /// ARP or RARP; both share the header layout.
    Arp(ArpView<'a>),
    Ip(IpView<'a>),
    /// Raw ethertype.
    Unknown(u16),
}

/// Layer above IPv4.
#[derive(Debug, Clone, Copy)]
pub enum Transport<'a> {
    Icmp(IcmpView<'a>),
    Udp(UdpView<'a>),
    Tcp(TcpView<'a>),
    /// Raw IP protocol number.
    Unknown(u8),
    /// The network layer carries no transport header.
    None,
}

/// Every header found in one frame.
#[derive(Debug, Clone, Copy)]
pub struct Dissection<'a> {
    pub ethernet: EthernetView<'a>,
    pub network: Network<'a>,
    pub transport: Transport<'a>,
}

/// Decodes the Ethernet frame at the start of `buffer` and everything it
/// carries that this crate understands.
pub fn dissect(buffer: &[u8]) -> Result<Dissection<'_>> {
    let ethernet = EthernetView::new(buffer, 0)?;
    trace!("ethernet {} -> {}, {}", ethernet.source(), ethernet.destination(), ethernet.protocol());

    let network = match ethernet.protocol() {
        EthernetProtocol::Arp | EthernetProtocol::Rarp => Network::Arp(ethernet.arp()?),
        EthernetProtocol::Ip => Network::Ip(ethernet.ip()?),
        EthernetProtocol::Undefined => {
            trace!("unknown ethertype {:#06x}", ethernet.ether_type());
            Network::Unknown(ethernet.ether_type())
        }
    };

    let transport = match network {
        Network::Ip(ip) => transport_of(&ip)?,
        _ => Transport::None,
    };

    Ok(Dissection {
        ethernet,
        network,
        transport,
    })
}

fn transport_of<'a>(ip: &IpView<'a>) -> Result<Transport<'a>> {
    trace!("ipv4 {} -> {}, {}", ip.source(), ip.destination(), ip.protocol());
    Ok(match ip.protocol() {
        IpProtocol::Icmp => Transport::Icmp(ip.icmp()?),
        IpProtocol::Udp => Transport::Udp(ip.udp()?),
        IpProtocol::Tcp => Transport::Tcp(ip.tcp()?),
        IpProtocol::Undefined => {
            trace!("unknown ip protocol {}", ip.protocol_number());
            Transport::Unknown(ip.protocol_number())
        }
    })
}

impl fmt::Display for Dissection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.ethernet)?;
        match &self.network {
            Network::Arp(arp) => writeln!(f, "{}", arp)?,
            Network::Ip(ip) => writeln!(f, "{}", ip)?,
            Network::Unknown(ether_type) => writeln!(f, "unknown ethertype {:#06x}", ether_type)?,
        }
        match &self.transport {
            Transport::Icmp(icmp) => writeln!(f, "{}", icmp),
            Transport::Udp(udp) => writeln!(f, "{}", udp),
            Transport::Tcp(tcp) => writeln!(f, "{}", tcp),
            Transport::Unknown(protocol) => writeln!(f, "unknown ip protocol {}", protocol),
            Transport::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::ETHERNET_HEADER_LEN;
    use crate::ip::IP_HEADER_MIN_LEN;
    use crate::FrameError;

    fn frame(ether_type: u16, ip_protocol: u8, l4_len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; ETHERNET_HEADER_LEN + IP_HEADER_MIN_LEN + l4_len];
        frame[0..6].copy_from_slice(&[0xff; 6]);
        frame[6..12].copy_from_slice(&[0xaa; 6]);
        frame[12..14].copy_from_slice(&ether_type.to_be_bytes());
        let ip = &mut frame[ETHERNET_HEADER_LEN..];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&((IP_HEADER_MIN_LEN + l4_len) as u16).to_be_bytes());
        ip[8] = 64;
        ip[9] = ip_protocol;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        frame
    }

    #[test]
    fn test_dissect_tcp() {
        let mut buffer = frame(0x0800, 6, 20);
        buffer[ETHERNET_HEADER_LEN + IP_HEADER_MIN_LEN + 12] = 0x50;
        buffer[ETHERNET_HEADER_LEN + IP_HEADER_MIN_LEN + 13] = 0x12;

        let dissection = dissect(&buffer).unwrap();
        assert!(matches!(dissection.network, Network::Ip(_)));
        match dissection.transport {
            Transport::Tcp(tcp) => {
                assert!(tcp.flags().syn && tcp.flags().ack);
            }
            other => panic!("Expected TCP, got {:?}", other),
        }
    }

    #[test]
    fn test_dissect_udp_and_icmp() {
        let buffer = frame(0x0800, 17, 8);
        assert!(matches!(dissect(&buffer).unwrap().transport, Transport::Udp(_)));

        let buffer = frame(0x0800, 1, 8);
        assert!(matches!(dissect(&buffer).unwrap().transport, Transport::Icmp(_)));
    }

    #[test]
    fn test_unknown_layers_stop_the_walk() {
        let buffer = frame(0x86dd, 6, 20);
        let dissection = dissect(&buffer).unwrap();
        assert!(matches!(dissection.network, Network::Unknown(0x86dd)));
        assert!(matches!(dissection.transport, Transport::None));

        let buffer = frame(0x0800, 47, 4);
        assert!(matches!(dissect(&buffer).unwrap().transport, Transport::Unknown(47)));
    }

    #[test]
    fn test_arp_has_no_transport() {
        let mut buffer = vec![0u8; ETHERNET_HEADER_LEN + 28];
        buffer[12..14].copy_from_slice(&[0x08, 0x06]);
        let dissection = dissect(&buffer).unwrap();
        assert!(matches!(dissection.network, Network::Arp(_)));
        assert!(matches!(dissection.transport, Transport::None));
    }

    #[test]
    fn test_truncated_transport_is_bounds_error() {
        let buffer = frame(0x0800, 6, 10);
        assert!(matches!(dissect(&buffer), Err(FrameError::Bounds { .. })));
        assert!(matches!(dissect(&buffer[..10]), Err(FrameError::Bounds { .. })));
    }

    #[test]
    fn test_display_lists_every_layer() {
        let buffer = frame(0x0800, 17, 8);
        let text = dissect(&buffer).unwrap().to_string();
        let ethernet = text.find("Ethernet header").unwrap();
        let ip = text.find("IP header").unwrap();
        let udp = text.find("UDP header").unwrap();
        assert!(ethernet < ip && ip < udp);
    }
}
