//! Wire-format definitions for protocol datagrams.
//!
//! Every datagram exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (20-octet header, big-endian fields,
//!   payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission,
//!   filling in the CRC-32 checksum for DATA packets.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed or truncated input.
//! - Formatting and parsing the handshake metadata payload.
//!
//! No I/O happens here — this is pure data transformation.  Checksum
//! *verification* is deliberately not done on decode: only the receiver cares,
//! and only for DATA packets (see [`crate::receiver`]).

use std::fmt;

/// Two-octet packet magic, `"RU"`.
pub const MAGIC: [u8; 2] = [0x52, 0x55];

/// Protocol version carried in every header.
pub const VERSION: u8 = 1;

/// Fixed header size in octets.  A datagram is `HEADER_LEN + payload.len()`.
pub const HEADER_LEN: usize = 20;

/// CRC-32 (IEEE 802.3, reflected, init/xor `0xFFFFFFFF`) over `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// Discriminant for the `type` header octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Opens a session; payload carries [`HandshakeMeta`].
    Handshake = 0,
    /// Accepts a handshake; `total` and `window` echo the negotiation.
    HandshakeAck = 1,
    /// One chunk of file content; `checksum` covers the payload.
    Data = 2,
    /// Cumulative acknowledgement; `seq` is the last in-order packet.
    Ack = 3,
    /// Sender is done; no payload.
    Fin = 4,
    /// Acknowledges FIN; sent even when no session is known.
    FinAck = 5,
    /// Diagnostic; payload is a short ASCII reason.
    Error = 6,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(v: u8) -> Result<Self, PacketError> {
        match v {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::HandshakeAck),
            2 => Ok(Self::Data),
            3 => Ok(Self::Ack),
            4 => Ok(Self::Fin),
            5 => Ok(Self::FinAck),
            6 => Ok(Self::Error),
            other => Err(PacketError::BadType(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Header / Packet
// ---------------------------------------------------------------------------

/// Fixed-size protocol header.
///
/// The on-wire `length` field is derived from the payload on encode and
/// validated on decode, so it is not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Packet type discriminant.
    pub ptype: PacketType,
    /// Sequence number (DATA) or acknowledged sequence number (ACK).
    pub seq: u32,
    /// Total packet count of the transfer.
    pub total: u32,
    /// Window size hint.
    pub window: u16,
    /// CRC-32 of the payload for DATA; zero on the wire for control packets.
    pub checksum: u32,
}

impl Header {
    /// Header with every numeric field zeroed, for control packets.
    pub fn control(ptype: PacketType) -> Self {
        Self {
            ptype,
            seq: 0,
            total: 0,
            window: 0,
            checksum: 0,
        }
    }

    /// Serialise this header followed by `payload` into `out`.
    ///
    /// `out` is cleared first so a single buffer can be reused across
    /// datagrams.  For DATA headers with a zero `checksum` the CRC-32 of the
    /// payload is computed and written; for non-DATA types the checksum field
    /// is always zero on the wire.
    pub fn encode_into(&self, payload: &[u8], out: &mut Vec<u8>) {
        debug_assert!(payload.len() <= u16::MAX as usize, "payload exceeds u16 length field");

        let chk = match self.ptype {
            PacketType::Data if self.checksum == 0 => checksum(payload),
            PacketType::Data => self.checksum,
            _ => 0,
        };

        out.clear();
        out.reserve(HEADER_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        out.push(self.ptype as u8);
        out.extend_from_slice(&self.seq.to_be_bytes());
        out.extend_from_slice(&self.total.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.window.to_be_bytes());
        out.extend_from_slice(&chk.to_be_bytes());
        out.extend_from_slice(payload);
    }
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A payload-less control packet of the given type.
    pub fn control(ptype: PacketType) -> Self {
        Self {
            header: Header::control(ptype),
            payload: Vec::new(),
        }
    }

    /// An ERROR packet carrying a short diagnostic reason.
    pub fn error(reason: &str) -> Self {
        Self {
            header: Header::control(PacketType::Error),
            payload: reason.as_bytes().to_vec(),
        }
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        self.header.encode_into(&self.payload, &mut out);
        out
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// Fails with [`PacketError::ShortHeader`] on fewer than 20 octets,
    /// [`PacketError::BadMagic`] on a magic or version mismatch,
    /// [`PacketError::BadType`] on an unknown type octet, and
    /// [`PacketError::TruncatedPayload`] when the declared length exceeds the
    /// available octets.  Trailing octets past the declared length are
    /// ignored.  The checksum is carried through unverified.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::ShortHeader);
        }
        if buf[0] != MAGIC[0] || buf[1] != MAGIC[1] || buf[2] != VERSION {
            return Err(PacketError::BadMagic);
        }
        let ptype = PacketType::try_from(buf[3])?;

        let seq = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let total = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let length = u16::from_be_bytes([buf[12], buf[13]]) as usize;
        let window = u16::from_be_bytes([buf[14], buf[15]]);
        let chk = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);

        if HEADER_LEN + length > buf.len() {
            return Err(PacketError::TruncatedPayload);
        }

        Ok(Self {
            header: Header {
                ptype,
                seq,
                total,
                window,
                checksum: chk,
            },
            payload: buf[HEADER_LEN..HEADER_LEN + length].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// PacketError
// ---------------------------------------------------------------------------

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    ShortHeader,
    /// Magic octets or version did not match.
    BadMagic,
    /// Unknown packet type octet.
    BadType(u8),
    /// Declared payload length exceeds the available octets.
    TruncatedPayload,
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortHeader => write!(f, "datagram shorter than header"),
            Self::BadMagic => write!(f, "bad magic or version"),
            Self::BadType(t) => write!(f, "unknown packet type {t}"),
            Self::TruncatedPayload => write!(f, "declared length exceeds datagram"),
        }
    }
}

impl std::error::Error for PacketError {}

// ---------------------------------------------------------------------------
// HandshakeMeta
// ---------------------------------------------------------------------------

/// The metadata tuple a sender declares when opening a session.
///
/// On the wire this is the HANDSHAKE payload:
/// `"<filename>|<filesize>|<total>|<chunk>|<window>"` as decimal ASCII with
/// `|` (0x7C) separators.  Extra trailing fields are tolerated on parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMeta {
    /// Basename of the file being transferred.
    pub filename: String,
    /// File size in bytes.
    pub filesize: u64,
    /// Total DATA packet count of the transfer.
    pub total: u32,
    /// Chunk size the sender will use.
    pub chunk: u32,
    /// Sender's configured window size.
    pub window: u16,
}

impl HandshakeMeta {
    /// Render the pipe-separated payload.
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.filename, self.filesize, self.total, self.chunk, self.window
        )
        .into_bytes()
    }

    /// Parse a HANDSHAKE payload.
    ///
    /// Requires at least five fields; returns `None` on too few fields,
    /// non-UTF-8 input, or non-numeric numeric fields.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let mut fields = text.split('|');
        let filename = fields.next()?.to_string();
        let filesize = fields.next()?.parse().ok()?;
        let total = fields.next()?.parse().ok()?;
        let chunk = fields.next()?.parse().ok()?;
        let window = fields.next()?.parse().ok()?;
        Some(Self {
            filename,
            filesize,
            total,
            chunk,
            window,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
