//! Datagram transport for protocol packets.
//!
//! [`Transport`] owns the UDP socket for one endpoint and speaks
//! [`crate::packet::Packet`] at its surface: outbound packets are encoded
//! into single datagrams, inbound datagrams are decoded before they reach
//! protocol code.  UDP delivers arbitrary junk, and the protocol's answer to
//! junk is silence — so datagrams that fail to decode are dropped right
//! here, and the state machines above only ever see well-formed packets.
//! A genuine transport failure still surfaces as [`std::io::Error`].

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::packet::Packet;

/// Receive buffer size: the largest datagram UDP can theoretically carry.
/// Actual protocol datagrams are bounded by the sender's chunk size.
const MAX_DATAGRAM: usize = 65_535;

/// A packet-oriented UDP endpoint.
///
/// All methods take `&self`; one transport serves a whole event loop.
#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl Transport {
    /// Bind to `addr`; port 0 asks the OS for an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    /// The bound address, with any OS-assigned port resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Encode `packet` and send it to `dest` as one datagram.
    ///
    /// Control packets take this path; encoding cannot fail, so the only
    /// error is the socket's.
    pub async fn send(&self, packet: &Packet, dest: SocketAddr) -> io::Result<()> {
        self.send_raw(&packet.encode(), dest).await
    }

    /// Send already-encoded datagram bytes to `dest`.
    ///
    /// DATA packets take this path: the transfer driver lays them out in one
    /// reused buffer via [`crate::packet::Header::encode_into`] instead of
    /// allocating per datagram.
    pub async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.socket.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Wait for the next well-formed packet.
    ///
    /// Undecodable datagrams are discarded without a reply and the wait
    /// continues; callers that need a bound on the wait wrap this future in a
    /// timeout.
    pub async fn recv(&self) -> io::Result<(Packet, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (n, from) = self.socket.recv_from(&mut buf).await?;
            match Packet::decode(&buf[..n]) {
                Ok(packet) => return Ok((packet, from)),
                Err(e) => log::trace!("[net] dropping {n}-byte datagram from {from}: {e}"),
            }
        }
    }
}
