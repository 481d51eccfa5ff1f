//! Internet checksum (RFC 1071).
//!
//! Used by the IPv4 header, ICMP messages and UDP datagrams. The functions
//! here are pure: they only read the span they are given.

use std::net::Ipv4Addr;

fn sum_words(data: &[u8], mut sum: u32) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    // Trailing odd byte is the high half of a zero-padded word.
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }
    sum
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}

/// Calculates the Internet checksum of `data`.
///
/// All 16-bit big-endian words are summed into a 32-bit accumulator, carries
/// are folded back into the low 16 bits, and the one's complement of the
/// result is returned.
///
/// Writing the result into the span's checksum field and summing again yields
/// zero, which is how received headers are verified.
pub fn internet_checksum(data: &[u8]) -> u16 {
    fold(sum_words(data, 0))
}

/// Calculates a transport checksum including the IPv4 pseudo-header
/// (source, destination, zero, protocol, segment length).
///
/// `segment` is the transport header plus payload. An IPv4 datagram cannot
/// carry more than 65535 bytes, so a longer segment is summed in full but
/// its length field saturates at `u16::MAX`.
pub fn pseudo_header_checksum(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, segment: &[u8]) -> u16 {
    let length = u16::try_from(segment.len()).unwrap_or(u16::MAX);
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src.octets());
    pseudo[4..8].copy_from_slice(&dst.octets());
    pseudo[9] = protocol;
    pseudo[10..12].copy_from_slice(&length.to_be_bytes());

    let sum = sum_words(&pseudo, 0);
    fold(sum_words(segment, sum))
}

#[cfg(test)]
mod tests {
    use super::*;

    // IPv4 header from RFC 1071 style examples, checksum field zeroed.
    const IP_HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn test_known_ip_header() {
        assert_eq!(internet_checksum(&IP_HEADER), 0xb861);
    }

    #[test]
    fn test_inserted_checksum_verifies_to_zero() {
        let mut header = IP_HEADER;
        let checksum = internet_checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        assert_eq!(internet_checksum(&header), 0);
    }

    #[test]
    fn test_odd_length_pads_low_byte() {
        assert_eq!(internet_checksum(&[0x12, 0x34, 0x56]), internet_checksum(&[0x12, 0x34, 0x56, 0x00]));
        assert_eq!(internet_checksum(&[0xff]), !0xff00u16);
    }

    #[test]
    fn test_carry_folding() {
        // 0xffff + 0x0001 overflows 16 bits and must wrap around.
        assert_eq!(internet_checksum(&[0xff, 0xff, 0x00, 0x01]), !0x0001u16);
        assert_eq!(internet_checksum(&[]), 0xffff);
    }

    #[test]
    fn test_deterministic() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(internet_checksum(&data), internet_checksum(&data));
    }

    #[test]
    fn test_pseudo_header_verifies() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        let mut segment = [0x03, 0xe8, 0x07, 0xd0, 0x00, 0x0a, 0x00, 0x00, 0xab, 0xcd];

        let checksum = pseudo_header_checksum(src, dst, 17, &segment);
        segment[6..8].copy_from_slice(&checksum.to_be_bytes());
        assert_eq!(pseudo_header_checksum(src, dst, 17, &segment), 0);
        assert_ne!(checksum, internet_checksum(&[0x03, 0xe8, 0x07, 0xd0, 0x00, 0x0a, 0x00, 0x00, 0xab, 0xcd]));
    }

    #[test]
    fn test_pseudo_header_length_saturates() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        // 65536 + 4 would wrap to a length of 4.
        let segment = vec![0u8; 65540];

        let mut pseudo = [0u8; 12];
        pseudo[0..4].copy_from_slice(&src.octets());
        pseudo[4..8].copy_from_slice(&dst.octets());
        pseudo[9] = 17;
        pseudo[10..12].copy_from_slice(&[0xff, 0xff]);
        let expected = fold(sum_words(&segment, sum_words(&pseudo, 0)));

        assert_eq!(pseudo_header_checksum(src, dst, 17, &segment), expected);
    }
}
