//! The sending role: drive one file to a peer and terminate.
//!
//! [`send_file`] runs three phases back to back:
//!
//! 1. **Handshake** — HANDSHAKE carrying the file metadata, repeated until
//!    HANDSHAKE_ACK arrives or the retry budget runs out.
//! 2. **Windowed transmission** — the Go-Back-N loop: fill the window with
//!    DATA packets, then wait on `tokio::select!` for either a cumulative
//!    ACK (slide the window) or the retransmit timer (resend everything in
//!    `[base, next_seq)`).  A single timer covers the oldest unacked packet;
//!    any forward progress restarts it, an empty window cancels it.
//! 3. **Teardown** — FIN repeated until FIN_ACK, same discipline as phase 1.
//!
//! An inbound ERROR packet aborts the phase it arrives in: the receiver only
//! sends ERROR when the transfer cannot proceed (malformed handshake, no
//! session for our DATA), so retrying the same bytes is pointless.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};

use crate::packet::{HandshakeMeta, Header, Packet, PacketType, HEADER_LEN};
use crate::transport::Transport;
use crate::window::SendWindow;

/// How long a disarmed retransmit timer sleeps.  The armed flag keeps the
/// select branch from firing; the duration only has to outlive any wait.
const DISARMED: Duration = Duration::from_secs(86_400);

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Operator-tunable transfer parameters.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// DATA payload size in bytes.
    pub chunk: usize,
    /// Window size in packets (N of Go-Back-N).
    pub window: u16,
    /// Response timeout for every wait (ACK, HANDSHAKE_ACK, FIN_ACK).
    pub timeout: Duration,
    /// Retry budget: handshake/FIN attempts, and consecutive data timeouts.
    pub max_retries: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk: 1024,
            window: 8,
            timeout: Duration::from_millis(300),
            max_retries: 20,
        }
    }
}

/// Ways a transfer can fail.
#[derive(Debug)]
pub enum SendError {
    /// Reading the source file or using the socket failed.
    Io(std::io::Error),
    /// No HANDSHAKE_ACK within the retry budget, or the peer rejected the
    /// handshake.
    HandshakeFailed,
    /// The data phase ran out of retries, or the peer reported an error.
    TransferFailed,
    /// No FIN_ACK within the retry budget.
    FinFailed,
}

impl SendError {
    /// Process exit code for this failure (0 is success).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::HandshakeFailed => 2,
            Self::TransferFailed => 3,
            Self::FinFailed => 4,
        }
    }
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::HandshakeFailed => write!(f, "handshake failed"),
            Self::TransferFailed => write!(f, "transfer retries exhausted"),
            Self::FinFailed => write!(f, "FIN not acknowledged"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Transfer driver
// ---------------------------------------------------------------------------

/// Transfer the file at `path` to `peer`.
///
/// Reads the whole file into memory once (chunks free individually as the
/// window advances), binds an ephemeral UDP port, and runs the three-phase
/// protocol to completion.
pub async fn send_file(
    path: &Path,
    peer: SocketAddr,
    config: &SenderConfig,
) -> Result<(), SendError> {
    let data = tokio::fs::read(path).await?;
    let mut window = SendWindow::new(&data, config.chunk, config.window);
    let meta = HandshakeMeta {
        filename: basename(&path.to_string_lossy()).to_string(),
        filesize: data.len() as u64,
        total: window.total(),
        chunk: config.chunk as u32,
        window: config.window,
    };
    drop(data);

    let transport = Transport::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?;
    log::info!(
        "[send] {} → {peer} ({} bytes, {} packets)",
        meta.filename,
        meta.filesize,
        meta.total
    );

    let handshake = Packet {
        header: Header::control(PacketType::Handshake),
        payload: meta.encode(),
    };
    if !request_reply(&transport, peer, &handshake, PacketType::HandshakeAck, config).await? {
        return Err(SendError::HandshakeFailed);
    }
    log::info!("[send] handshake acknowledged");

    transmit(&transport, peer, &mut window, config).await?;

    let fin = Packet::control(PacketType::Fin);
    if !request_reply(&transport, peer, &fin, PacketType::FinAck, config).await? {
        return Err(SendError::FinFailed);
    }
    log::info!("[send] transfer complete ({} packets)", window.total());
    Ok(())
}

/// Final path component, accepting either separator in the input.
fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Send `request` and wait for a packet of type `expect` from `peer`.
///
/// Retries up to `max_retries` times, each attempt waiting `timeout`.
/// Returns `Ok(true)` on the expected reply and `Ok(false)` when the budget
/// is exhausted or the peer answers with ERROR.  Unrelated packets and
/// undecodable noise are ignored without consuming the attempt.
async fn request_reply(
    transport: &Transport,
    peer: SocketAddr,
    request: &Packet,
    expect: PacketType,
    config: &SenderConfig,
) -> std::io::Result<bool> {
    let bytes = request.encode();

    for attempt in 1..=config.max_retries {
        transport.send_raw(&bytes, peer).await?;
        let deadline = Instant::now() + config.timeout;

        loop {
            match timeout_at(deadline, transport.recv()).await {
                Err(_) => break, // attempt timed out
                Ok(Ok((pkt, from))) if from == peer => {
                    if pkt.header.ptype == expect {
                        return Ok(true);
                    }
                    if pkt.header.ptype == PacketType::Error {
                        log::warn!(
                            "[send] peer error: {}",
                            String::from_utf8_lossy(&pkt.payload)
                        );
                        return Ok(false);
                    }
                }
                Ok(Ok(_)) => {} // some other peer
                Ok(Err(e)) => return Err(e),
            }
        }
        log::debug!(
            "[send] no {expect:?} within {:?} (attempt {attempt}/{})",
            config.timeout,
            config.max_retries
        );
    }
    Ok(false)
}

/// Phase 2: the Go-Back-N send loop.
async fn transmit(
    transport: &Transport,
    peer: SocketAddr,
    window: &mut SendWindow,
    config: &SenderConfig,
) -> Result<(), SendError> {
    let total = window.total();
    let mut out = Vec::with_capacity(HEADER_LEN + config.chunk);

    // One retransmit timer covers the oldest unacked packet.  The armed flag
    // gates the select branch; a disarmed timer just sleeps far out.
    let timer = sleep(DISARMED);
    tokio::pin!(timer);
    let mut timer_armed = false;

    while !window.is_complete() {
        // Fill the window with new DATA packets.
        while let Some(seq) = window.advance_next() {
            if let Some(payload) = window.payload(seq) {
                data_header(seq, total, config.window).encode_into(payload, &mut out);
                transport.send_raw(&out, peer).await?;
                log::trace!("[send] → DATA seq={seq} len={}", out.len() - HEADER_LEN);
            }
        }
        if window.has_outstanding() && !timer_armed {
            timer.as_mut().reset(Instant::now() + config.timeout);
            timer_armed = true;
        }

        tokio::select! {
            result = transport.recv() => match result {
                Ok((pkt, from)) if from == peer => match pkt.header.ptype {
                    PacketType::Ack => {
                        if window.on_ack(pkt.header.seq) {
                            log::debug!(
                                "[send] ← ACK seq={} base={}/{total}",
                                pkt.header.seq,
                                window.base()
                            );
                            if window.has_outstanding() {
                                timer.as_mut().reset(Instant::now() + config.timeout);
                            } else {
                                timer_armed = false;
                            }
                        }
                    }
                    PacketType::Error => {
                        log::warn!(
                            "[send] peer error: {}; aborting transfer",
                            String::from_utf8_lossy(&pkt.payload)
                        );
                        return Err(SendError::TransferFailed);
                    }
                    _ => {}
                },
                Ok(_) => {} // some other peer
                Err(e) => return Err(SendError::Io(e)),
            },

            _ = &mut timer, if timer_armed => {
                let retries = window.bump_retry();
                if retries > config.max_retries {
                    log::warn!("[send] max retries exceeded at base={}", window.base());
                    return Err(SendError::TransferFailed);
                }

                // Go back N: every outstanding packet goes out again;
                // next_seq is not rewound.
                let mut resent = 0u32;
                for (seq, payload) in window.outstanding() {
                    data_header(seq, total, config.window).encode_into(payload, &mut out);
                    transport.send_raw(&out, peer).await?;
                    resent += 1;
                }
                log::debug!(
                    "[send] timeout — retransmitting {resent} packet(s) from base={} (retry {retries}/{})",
                    window.base(),
                    config.max_retries
                );
                timer.as_mut().reset(Instant::now() + config.timeout);
            }
        }
    }
    Ok(())
}

fn data_header(seq: u32, total: u32, window: u16) -> Header {
    Header {
        ptype: PacketType::Data,
        seq,
        total,
        window,
        checksum: 0, // filled in by the encoder
    }
}
