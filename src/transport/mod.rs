//! Transport bridge between the protocol engine and the UDP socket.
//!
//! The engine addresses peers through a fixed 6-byte connection string:
//! 4 IPv4 octets followed by a little-endian 2-byte port.
//! [`ConnectionString`] is the bidirectional codec for that layout;
//! [`udp::UdpLink`] owns the socket and the inbound FIFO.

use crate::error::{Error, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

pub mod udp;

pub use udp::UdpLink;

/// Network type tag reported with received datagrams (BACnet/IP)
pub const NETWORK_TYPE_IP: u8 = 0;

/// Largest datagram the reader accepts from the socket
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// 6-byte address encoding used at the engine boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionString {
    octets: [u8; 6],
}

impl ConnectionString {
    /// Encoded length; always 6 for this transport
    pub const LENGTH: usize = 6;

    /// Encode an address and port
    pub fn from_parts(addr: Ipv4Addr, port: u16) -> Self {
        let ip = addr.octets();
        let p = port.to_le_bytes();
        Self {
            octets: [ip[0], ip[1], ip[2], ip[3], p[0], p[1]],
        }
    }

    pub fn from_socket_addr(addr: SocketAddrV4) -> Self {
        Self::from_parts(*addr.ip(), addr.port())
    }

    /// Decode from raw bytes; the slice must be exactly 6 bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LENGTH {
            return Err(Error::InvalidConnectionString(bytes.len()));
        }
        let mut octets = [0u8; 6];
        octets.copy_from_slice(bytes);
        Ok(Self { octets })
    }

    pub fn addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.octets[0],
            self.octets[1],
            self.octets[2],
            self.octets[3],
        )
    }

    /// Port, stored little-endian in the trailing two bytes
    pub fn port(&self) -> u16 {
        u16::from_le_bytes([self.octets[4], self.octets[5]])
    }

    pub fn to_socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr(), self.port())
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.octets
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr(), self.port())
    }
}

/// One datagram as delivered by the socket, queued until the next tick
#[derive(Debug, Clone)]
pub struct InboundDatagram {
    pub payload: Vec<u8>,
    pub source: SocketAddrV4,
}

/// One datagram handed to the engine, with its re-encoded source address
#[derive(Debug, Clone)]
pub struct ReceivedDatagram {
    pub payload: Vec<u8>,
    pub source: ConnectionString,
    /// Declared length of `source`; always [`ConnectionString::LENGTH`]
    pub source_length: usize,
    /// Transport tag for this datagram ([`NETWORK_TYPE_IP`])
    pub network_type: u8,
}
