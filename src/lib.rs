//! `ruft` — reliable one-way file transfer over UDP.
//!
//! A sender streams the bytes of a single file to a receiver using a
//! Go-Back-N sliding window with explicit session setup and teardown,
//! per-datagram CRC-32 integrity, and cumulative acknowledgement.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  HANDSHAKE / DATA / FIN   ┌──────────┐
//!  │  Sender  │──────────────────────────▶│ Receiver │
//!  └────┬─────┘                           └─────┬────┘
//!       │   HANDSHAKE_ACK / ACK / FIN_ACK       │
//!       │◀──────────────────────────────────────┘
//!       │                                       │
//!  ┌────▼───────┐                      ┌────────▼──────┐
//!  │ SendWindow │ (GBN state)          │ SessionTable  │ (per-peer state)
//!  └────┬───────┘                      └────────┬──────┘
//!       │          raw UDP datagrams            │
//!  ┌────▼───────────────────────────────────────▼──┐
//!  │  Transport  (packet-oriented tokio UdpSocket) │
//!  └───────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]    — wire format (serialise / deserialise, CRC-32, handshake metadata)
//! - [`transport`] — packet-oriented UDP endpoint; drops undecodable noise
//! - [`window`]    — Go-Back-N send-side state machine
//! - [`session`]   — receiver-side session table and in-order sinks
//! - [`sender`]    — the sending role: handshake, windowed transfer, teardown
//! - [`receiver`]  — the receiving role: ingress loop and idle eviction

pub mod packet;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod transport;
pub mod window;

pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{send_file, SendError, SenderConfig};
