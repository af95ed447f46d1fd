//! Receiver-side session state.
//!
//! A [`Session`] is created by a HANDSHAKE and destroyed by FIN, idle
//! eviction, or a re-handshake from the same peer.  It owns the append-only
//! sink file and the in-order delivery cursor for one transfer.
//!
//! The [`SessionTable`] keys sessions by *peer key* — the canonical
//! `ip:port` string of the sender's datagram address.  It is a plain vector
//! with a linear scan: the table is bounded at a small capacity, so a scan
//! beats a hash map in both simplicity and cache behaviour.
//!
//! Only in-order DATA is ever committed (`seq == expected`); everything else
//! is dropped, so gaps are never materialised on disk.  All socket I/O is the
//! caller's responsibility (see [`crate::receiver`]).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::packet::HandshakeMeta;

/// Milliseconds since the Unix epoch, truncated to `u32`.
///
/// Session ids come from this clock; the id is embedded in the sink filename
/// so concurrent and successive transfers of the same file never collide
/// within one receiver.
pub fn wall_clock_id() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Final path component of a declared filename, with either separator.
///
/// Senders declare a basename already, but the declared name is peer input
/// and must not be able to escape the output directory.
fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One in-progress transfer from one peer.
#[derive(Debug)]
pub struct Session {
    /// Canonical `ip:port` of the sending peer; primary key.
    pub peer_key: String,
    /// Local identifier, from [`wall_clock_id`] at creation.
    pub session_id: u32,
    /// Declared filename (basename only).
    pub filename: String,
    /// Declared total DATA packet count.
    pub total: u32,
    /// Next in-order sequence number.
    pub expected: u32,
    /// Count of in-order packets committed to the sink.
    pub received: u32,
    /// Where the sink lives on disk.
    pub path: PathBuf,
    sink: BufWriter<File>,
    last_activity: Instant,
}

impl Session {
    /// Create a session and open its sink at
    /// `<outdir>/<filename>_<session_id>_<peer_key>`.
    pub fn open(
        outdir: &Path,
        meta: &HandshakeMeta,
        peer_key: &str,
        session_id: u32,
    ) -> std::io::Result<Self> {
        let filename = basename(&meta.filename).to_string();
        let path = outdir.join(format!("{filename}_{session_id}_{peer_key}"));
        let sink = BufWriter::new(File::create(&path)?);
        Ok(Self {
            peer_key: peer_key.to_string(),
            session_id,
            filename,
            total: meta.total,
            expected: 0,
            received: 0,
            path,
            sink,
            last_activity: Instant::now(),
        })
    }

    /// Process one DATA payload.
    ///
    /// Appends and advances when `seq` is exactly the next expected sequence
    /// number; returns `false` for out-of-order or duplicate packets, which
    /// Go-Back-N drops without buffering.  A failed write is logged and
    /// tolerated — the cursor still advances, matching the protocol's
    /// cumulative ACK already having promised this sequence number.
    pub fn accept(&mut self, seq: u32, payload: &[u8]) -> bool {
        if seq != self.expected {
            return false;
        }
        if let Err(e) = self.sink.write_all(payload) {
            log::error!(
                "[recv] {} write failed on {}: {e}",
                self.peer_key,
                self.path.display()
            );
        }
        self.expected += 1;
        self.received += 1;
        true
    }

    /// Sequence number to place in the next cumulative ACK: the last
    /// in-order packet, clamped to 0 while nothing has been committed.
    pub fn ack_seq(&self) -> u32 {
        self.expected.max(1) - 1
    }

    /// Record activity from the owning peer.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// `true` when the session has been silent longer than `max_idle`.
    pub fn idle_since(&self, now: Instant, max_idle: Duration) -> bool {
        now.duration_since(self.last_activity) > max_idle
    }

    /// Flush and close the sink, best-effort.
    pub fn close(mut self) {
        if let Err(e) = self.sink.flush() {
            log::warn!(
                "[recv] {} flush failed on {}: {e}",
                self.peer_key,
                self.path.display()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// SessionTable
// ---------------------------------------------------------------------------

/// All live sessions, keyed by peer address.
#[derive(Debug)]
pub struct SessionTable {
    sessions: Vec<Session>,
    capacity: usize,
}

impl SessionTable {
    /// An empty table holding at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when the table holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// `true` when no further handshakes can be admitted.
    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.capacity
    }

    /// Look up the session for `peer_key`.
    pub fn get_mut(&mut self, peer_key: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.peer_key == peer_key)
    }

    /// Remove and return the session for `peer_key`, if any.
    pub fn remove(&mut self, peer_key: &str) -> Option<Session> {
        let idx = self.sessions.iter().position(|s| s.peer_key == peer_key)?;
        Some(self.sessions.remove(idx))
    }

    /// Admit a new session.  The caller checks [`is_full`](Self::is_full)
    /// (and closes any prior session for the same peer) first.
    pub fn insert(&mut self, session: Session) {
        debug_assert!(self.sessions.len() < self.capacity);
        debug_assert!(self.get_key(&session.peer_key).is_none());
        self.sessions.push(session);
    }

    fn get_key(&self, peer_key: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.peer_key == peer_key)
    }

    /// Remove every session idle longer than `max_idle`, returning them so
    /// the caller can log and close each one.
    pub fn evict_idle(&mut self, now: Instant, max_idle: Duration) -> Vec<Session> {
        let mut evicted = Vec::new();
        let mut i = 0;
        while i < self.sessions.len() {
            if self.sessions[i].idle_since(now, max_idle) {
                evicted.push(self.sessions.remove(i));
            } else {
                i += 1;
            }
        }
        evicted
    }

    /// Remove every session, for shutdown flushing.
    pub fn drain(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
