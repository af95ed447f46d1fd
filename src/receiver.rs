//! The receiving role: accept handshakes, reassemble files, evict the idle.
//!
//! [`Receiver::run`] is a single event loop multiplexing three things with
//! `tokio::select!`:
//! - inbound datagrams, dispatched by packet type;
//! - a periodic sweep that closes sessions gone silent;
//! - ctrl-c, which flushes every open sink before returning.
//!
//! The session table and every sink are owned by this loop alone; nothing is
//! shared across tasks.  Undecodable datagrams are dropped without a reply,
//! protocol violations get a diagnostic ERROR packet, and FIN is always
//! answered — even without a session — so a sender whose state was evicted
//! still terminates cleanly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::time::interval;

use crate::packet::{checksum, HandshakeMeta, Header, Packet, PacketType};
use crate::session::{wall_clock_id, Session, SessionTable};
use crate::transport::Transport;

/// How often the session table is swept for idle entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Silence after which a session is evicted and its sink closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Operator-tunable receiver parameters.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// UDP port to listen on (0 for an OS-assigned port).
    pub port: u16,
    /// Directory receiving one file per session.
    pub outdir: PathBuf,
    /// Window size hint advertised in HANDSHAKE_ACK.
    pub window: u16,
    /// Session table capacity; handshakes beyond it are dropped.
    pub max_sessions: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            outdir: PathBuf::from("./server_data"),
            window: 8,
            max_sessions: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// The receiving endpoint: one socket, one session table.
pub struct Receiver {
    transport: Transport,
    table: SessionTable,
    config: ReceiverConfig,
}

impl Receiver {
    /// Create the output directory and bind the listening socket.
    pub async fn bind(config: ReceiverConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.outdir)?;
        let transport = Transport::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
        Ok(Self {
            transport,
            table: SessionTable::new(config.max_sessions),
            config,
        })
    }

    /// Address the receiver is listening on (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Run the ingress loop until ctrl-c.
    pub async fn run(&mut self) -> std::io::Result<()> {
        log::info!(
            "[recv] listening on UDP {} → {}",
            self.transport.local_addr().port(),
            self.config.outdir.display()
        );
        let mut sweep = interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                result = self.transport.recv() => match result {
                    Ok((pkt, from)) => self.dispatch(pkt, from).await,
                    Err(e) => log::error!("[recv] receive failed: {e}"),
                },

                _ = sweep.tick() => self.sweep_idle(),

                _ = tokio::signal::ctrl_c() => {
                    self.shutdown();
                    return Ok(());
                }
            }
        }
    }

    /// Route one decoded datagram.  Reply types a receiver never consumes
    /// (ACK, HANDSHAKE_ACK, FIN_ACK, ERROR) are ignored.
    async fn dispatch(&mut self, pkt: Packet, from: SocketAddr) {
        let peer_key = from.to_string();
        match pkt.header.ptype {
            PacketType::Handshake => self.on_handshake(&pkt.payload, from, &peer_key).await,
            PacketType::Data => self.on_data(&pkt, from, &peer_key).await,
            PacketType::Fin => self.on_fin(from, &peer_key).await,
            _ => {}
        }
    }

    async fn on_handshake(&mut self, payload: &[u8], from: SocketAddr, peer_key: &str) {
        let Some(meta) = HandshakeMeta::parse(payload) else {
            log::warn!("[recv] {peer_key} bad handshake");
            self.reply(Packet::error("bad handshake"), from).await;
            return;
        };

        // A repeated handshake replaces the peer's session wholesale; the
        // old partial file stays on disk under its own suffix.
        if let Some(old) = self.table.remove(peer_key) {
            log::info!(
                "[recv] {peer_key} re-handshake; closing session {}",
                old.session_id
            );
            old.close();
        }

        if self.table.is_full() {
            log::warn!(
                "[recv] {peer_key} handshake dropped: session table full ({})",
                self.table.len()
            );
            return;
        }

        let session = match Session::open(&self.config.outdir, &meta, peer_key, wall_clock_id()) {
            Ok(s) => s,
            Err(e) => {
                log::error!("[recv] {peer_key} cannot open sink for {}: {e}", meta.filename);
                return;
            }
        };
        log::info!(
            "[recv] {peer_key} handshake for {} total={} → {}",
            session.filename,
            session.total,
            session.path.display()
        );

        let ack = Packet {
            header: Header {
                ptype: PacketType::HandshakeAck,
                seq: 0,
                total: session.total,
                window: self.config.window,
                checksum: 0,
            },
            payload: Vec::new(),
        };
        self.table.insert(session);
        self.reply(ack, from).await;
    }

    async fn on_data(&mut self, pkt: &Packet, from: SocketAddr, peer_key: &str) {
        let Some(session) = self.table.get_mut(peer_key) else {
            self.reply(Packet::error("no session"), from).await;
            return;
        };
        session.touch();

        if pkt.header.checksum != checksum(&pkt.payload) {
            // Corrupt payload: drop it, but re-ACK the last in-order packet
            // so the sender's timer leads it to retransmit.
            log::debug!(
                "[recv] {peer_key} checksum mismatch on seq={}",
                pkt.header.seq
            );
        } else if session.accept(pkt.header.seq, &pkt.payload) {
            log::trace!(
                "[recv] {peer_key} DATA seq={} committed ({}/{})",
                pkt.header.seq,
                session.received,
                session.total
            );
        } else {
            log::trace!(
                "[recv] {peer_key} DATA seq={} dropped (expected {})",
                pkt.header.seq,
                session.expected
            );
        }

        let mut ack = Packet::control(PacketType::Ack);
        ack.header.seq = session.ack_seq();
        self.reply(ack, from).await;
    }

    async fn on_fin(&mut self, from: SocketAddr, peer_key: &str) {
        if let Some(session) = self.table.remove(peer_key) {
            log::info!(
                "[recv] {peer_key} transfer complete {}/{} packets → {}",
                session.received,
                session.total,
                session.path.display()
            );
            session.close();
        }
        self.reply(Packet::control(PacketType::FinAck), from).await;
    }

    fn sweep_idle(&mut self) {
        for session in self.table.evict_idle(Instant::now(), IDLE_TIMEOUT) {
            log::info!(
                "[recv] {} evicting idle session {} ({}/{} packets)",
                session.peer_key,
                session.session_id,
                session.received,
                session.total
            );
            session.close();
        }
    }

    fn shutdown(&mut self) {
        log::info!(
            "[recv] shutting down; flushing {} open session(s)",
            self.table.len()
        );
        for session in self.table.drain() {
            session.close();
        }
    }

    /// Best-effort reply; UDP send failures are logged, never fatal.
    async fn reply(&self, packet: Packet, dest: SocketAddr) {
        if let Err(e) = self.transport.send(&packet, dest).await {
            log::warn!("[recv] reply to {dest} failed: {e}");
        }
    }
}
