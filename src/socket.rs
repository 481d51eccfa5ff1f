//! Raw IPv4 sockets that carry finished frames.
//!
//! These types only move bytes: they take a buffer a builder has filled and
//! hand back a buffer for the views to read. Opening a raw socket usually
//! needs elevated privileges.

use std::io::{self, ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

use crate::error::{FrameError, Result};
use crate::ip::IP_HEADER_MIN_LEN;

/// `IPPROTO_RAW`: a send-only socket whose frames carry their own IPv4 header.
pub const HEADER_INCLUDED: i32 = 255;

/// Smallest receive buffer accepted; raw IPv4 sockets deliver the IP header.
const MIN_BUFFER_SIZE: usize = IP_HEADER_MIN_LEN;

fn destination(addr: Ipv4Addr) -> SockAddr {
    SockAddr::from(SocketAddr::V4(SocketAddrV4::new(addr, 0)))
}

fn check_receive_buffer(buffer: &[u8]) -> Result<()> {
    if buffer.len() < MIN_BUFFER_SIZE {
        return Err(FrameError::Io(io::Error::new(
            ErrorKind::InvalidInput,
            format!("Buffer size must be at least {} bytes", MIN_BUFFER_SIZE),
        )));
    }
    Ok(())
}

fn open(protocol: Protocol) -> Result<Socket> {
    Socket::new(Domain::IPV4, Type::RAW, Some(protocol)).map_err(|e| {
        debug!("could not open raw socket for {:?}: {}", protocol, e);
        FrameError::Io(e)
    })
}

/// A blocking raw socket.
#[derive(Debug)]
pub struct RawSocket {
    socket: Socket,
    is_blocking: bool,
}

impl RawSocket {
    /// Opens a raw IPv4 socket for `protocol`, e.g. [`Protocol::ICMPV4`] to
    /// receive ICMP or `Protocol::from(HEADER_INCLUDED)` to send whole IP datagrams.
    pub fn new(protocol: Protocol) -> Result<Self> {
        Ok(Self {
            socket: open(protocol)?,
            is_blocking: true,
        })
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) -> Result<()> {
        self.socket.set_nonblocking(nonblocking)?;
        self.is_blocking = !nonblocking;
        Ok(())
    }

    /// Sets the read and write timeout; `None` blocks indefinitely.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout)?;
        self.socket.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Binds the socket to a local IPv4 address.
    pub fn bind(&self, addr: Ipv4Addr) -> Result<()> {
        self.socket.bind(&destination(addr))?;
        Ok(())
    }

    /// Sends `frame` to `dst` and returns the number of bytes written.
    ///
    /// On a [`HEADER_INCLUDED`] socket `frame` must start with the IPv4
    /// header; otherwise the kernel prepends one.
    pub fn send_to(&self, frame: &[u8], dst: Ipv4Addr) -> Result<usize> {
        let sent = self.socket.send_to(frame, &destination(dst))?;
        debug!("sent {} of {} bytes to {}", sent, frame.len(), dst);
        Ok(sent)
    }

    /// Receives one datagram, IPv4 header first, into `buffer`.
    pub fn receive(&self, buffer: &mut [u8]) -> Result<usize> {
        check_receive_buffer(buffer)?;
        let received = (&self.socket).read(buffer)?;
        debug!("received {} bytes", received);
        Ok(received)
    }

    /// Like [`receive`](Self::receive) but returns `Ok(None)` when nothing is
    /// queued. Only valid on a non-blocking socket.
    pub fn try_receive(&self, buffer: &mut [u8]) -> Result<Option<usize>> {
        if self.is_blocking {
            return Err(FrameError::Io(io::Error::new(
                ErrorKind::Unsupported,
                "Socket is in blocking mode",
            )));
        }
        match self.receive(buffer) {
            Ok(received) => Ok(Some(received)),
            Err(FrameError::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A raw socket driven by the tokio reactor.
#[derive(Debug)]
pub struct AsyncRawSocket {
    inner: AsyncFd<Socket>,
}

impl AsyncRawSocket {
    /// Opens a non-blocking raw socket. Must be called within a tokio runtime.
    pub fn new(protocol: Protocol) -> Result<Self> {
        let socket = open(protocol)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: AsyncFd::with_interest(socket, Interest::READABLE | Interest::WRITABLE)?,
        })
    }

    pub fn bind(&self, addr: Ipv4Addr) -> Result<()> {
        self.inner.get_ref().bind(&destination(addr))?;
        Ok(())
    }

    pub async fn send_to(&self, frame: &[u8], dst: Ipv4Addr) -> Result<usize> {
        let addr = destination(dst);
        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send_to(frame, &addr)) {
                Ok(sent) => {
                    let sent = sent?;
                    debug!("sent {} of {} bytes to {}", sent, frame.len(), dst);
                    return Ok(sent);
                }
                Err(_would_block) => continue,
            }
        }
    }

    pub async fn receive(&self, buffer: &mut [u8]) -> Result<usize> {
        check_receive_buffer(buffer)?;
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| {
                let mut socket = inner.get_ref();
                socket.read(buffer)
            }) {
                Ok(received) => {
                    let received = received?;
                    debug!("received {} bytes", received);
                    return Ok(received);
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Waits until a datagram is queued, without consuming it.
    pub async fn readable(&self) -> Result<()> {
        let _guard = self.inner.readable().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icmp::{IcmpBuilder, IcmpCode, IcmpType, ICMP_HEADER_LEN};
    use crate::ip::{IpBuilder, IpProtocol};
    use crate::Checksumable;

    const LOCAL_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;
    const TIMEOUT: Duration = Duration::from_millis(100);
    const DATAGRAM_LEN: usize = IP_HEADER_MIN_LEN + ICMP_HEADER_LEN;

    fn create_test_datagram() -> [u8; DATAGRAM_LEN] {
        let mut buffer = [0u8; DATAGRAM_LEN];
        {
            let mut icmp = IcmpBuilder::new(&mut buffer, IP_HEADER_MIN_LEN).unwrap();
            icmp.set_type(IcmpType::EchoRequest)
                .unwrap()
                .set_code(IcmpCode::None)
                .unwrap()
                .set_id(0x4242)
                .set_sequence_number(1);
            let checksum = icmp.default_checksum();
            icmp.set_checksum(checksum);
        }
        let mut ip = IpBuilder::new(&mut buffer, 0).unwrap();
        ip.apply_defaults()
            .set_total_length(DATAGRAM_LEN as u16)
            .set_protocol(IpProtocol::Icmp)
            .unwrap()
            .set_source(LOCAL_ADDR)
            .set_destination(LOCAL_ADDR);
        let checksum = ip.calculate_checksum();
        ip.set_checksum(checksum);
        buffer
    }

    fn skip_if_permission_error<T>(result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(FrameError::Io(e)) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to insufficient permissions");
                None
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    fn is_expected_timeout(e: &FrameError) -> bool {
        match e {
            FrameError::Io(e) => matches!(
                e.kind(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }

    #[test]
    fn test_socket_creation() {
        if skip_if_permission_error(RawSocket::new(Protocol::ICMPV4)).is_none() {
            return;
        }
    }

    #[test]
    fn test_socket_bind_and_timeout() {
        let mut socket = match skip_if_permission_error(RawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };
        socket.bind(LOCAL_ADDR).unwrap();
        socket.set_timeout(Some(TIMEOUT)).unwrap();
        socket.set_timeout(None).unwrap();
    }

    #[test]
    fn test_buffer_boundaries() {
        let socket = match skip_if_permission_error(RawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };

        let mut small_buffer = vec![0u8; MIN_BUFFER_SIZE - 1];
        match socket.receive(&mut small_buffer) {
            Err(FrameError::Io(e)) => assert_eq!(e.kind(), ErrorKind::InvalidInput),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_try_receive_modes() {
        let mut socket = match skip_if_permission_error(RawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };
        let mut buffer = vec![0u8; 2048];

        assert!(matches!(
            socket.try_receive(&mut buffer),
            Err(FrameError::Io(e)) if e.kind() == ErrorKind::Unsupported
        ));

        socket.set_nonblocking(true).unwrap();
        // Unrelated ICMP traffic may be queued; either outcome is fine.
        assert!(socket.try_receive(&mut buffer).is_ok());
    }

    #[test]
    fn test_blocking_send_receive() {
        let sender = match skip_if_permission_error(RawSocket::new(Protocol::from(HEADER_INCLUDED))) {
            Some(s) => s,
            None => return,
        };
        let mut receiver = match skip_if_permission_error(RawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };
        receiver.set_timeout(Some(TIMEOUT)).unwrap();

        let datagram = create_test_datagram();
        match sender.send_to(&datagram, LOCAL_ADDR) {
            Ok(sent) => {
                assert_eq!(sent, DATAGRAM_LEN);
                let mut buffer = vec![0u8; 2048];
                match receiver.receive(&mut buffer) {
                    Ok(n) => assert!(n >= DATAGRAM_LEN),
                    Err(e) => assert!(is_expected_timeout(&e), "Unexpected error: {:?}", e),
                }
            }
            Err(e) => assert!(is_expected_timeout(&e), "Unexpected error: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_async_send_receive() {
        let socket = match skip_if_permission_error(AsyncRawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };
        let sender = match skip_if_permission_error(AsyncRawSocket::new(Protocol::from(HEADER_INCLUDED))) {
            Some(s) => s,
            None => return,
        };
        socket.bind(LOCAL_ADDR).unwrap();

        let datagram = create_test_datagram();
        match sender.send_to(&datagram, LOCAL_ADDR).await {
            Ok(n) => assert_eq!(n, DATAGRAM_LEN),
            Err(e) => eprintln!("Send error (might be expected): {:?}", e),
        }

        let mut buffer = vec![0u8; 2048];
        // Timing out is acceptable.
        if let Ok(result) = tokio::time::timeout(TIMEOUT, socket.receive(&mut buffer)).await {
            match result {
                Ok(n) => assert!(n >= IP_HEADER_MIN_LEN),
                Err(e) => eprintln!("Receive error (might be expected): {:?}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_async_readable() {
        let socket = match skip_if_permission_error(AsyncRawSocket::new(Protocol::ICMPV4)) {
            Some(s) => s,
            None => return,
        };

        if let Ok(result) = tokio::time::timeout(TIMEOUT, socket.readable()).await {
            assert!(result.is_ok());
        }
    }
}
