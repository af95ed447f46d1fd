//! Go-Back-N send-side state machine.
//!
//! [`SendWindow`] owns the chunked file content and the sliding window of up
//! to `window` in-flight DATA packets.
//!
//! # Protocol contract
//!
//! - Sequence numbers count *packets*, not bytes; packet `seq` carries
//!   `chunks[seq]`.
//! - At most `window` packets may be in flight (`base ≤ next_seq ≤
//!   min(base + window, total)`).
//! - ACKs are **cumulative**: `seq = K` means the receiver has committed
//!   every packet with sequence number ≤ K.
//! - On timeout the caller retransmits every outstanding packet in
//!   `[base, next_seq)`; `next_seq` itself is never rewound.
//! - Acknowledged chunks are dropped so their buffers free as the window
//!   advances.
//!
//! This module only manages state; all socket I/O and timing is the caller's
//! responsibility (see [`crate::sender`]).

/// Go-Back-N send-side state for one transfer.
///
/// # Sequence-number layout
///
/// ```text
///     base            next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ <── in flight ──▶│ <── sendable ───▶          total
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// File content partitioned into `chunk_size` payloads; acknowledged
    /// entries are `None`.
    chunks: Vec<Option<Vec<u8>>>,

    /// Oldest unacknowledged sequence number (left window edge).
    base: u32,

    /// Next sequence number to transmit.
    next_seq: u32,

    /// Maximum number of packets in flight simultaneously (N).
    window: u16,

    /// Consecutive timer expiries since the last forward progress.
    retry_count: u32,
}

impl SendWindow {
    /// Partition `data` into `chunk_size`-byte payloads (last may be shorter)
    /// with a window of `window` packets (≥ 1).
    ///
    /// Empty `data` yields `total() == 0`: the transfer is complete before a
    /// single DATA packet is sent.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(data: &[u8], chunk_size: usize, window: u16) -> Self {
        assert!(chunk_size >= 1, "chunk_size must be at least 1");
        Self {
            chunks: data.chunks(chunk_size).map(|c| Some(c.to_vec())).collect(),
            base: 0,
            next_seq: 0,
            window: window.max(1),
            retry_count: 0,
        }
    }

    /// Total DATA packet count of the transfer.
    pub fn total(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// Oldest unacknowledged sequence number.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Next sequence number to transmit.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// `true` once every packet has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base >= self.total()
    }

    /// `true` while at least one packet is awaiting acknowledgement.
    ///
    /// This is exactly the condition under which the retransmit timer runs.
    pub fn has_outstanding(&self) -> bool {
        self.base < self.next_seq
    }

    /// Consecutive timer expiries since the last forward progress.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Claim the next sendable sequence number, advancing `next_seq`.
    ///
    /// Returns `None` when the window is full or every packet has been
    /// claimed; call [`payload`](Self::payload) to fetch the chunk to send.
    pub fn advance_next(&mut self) -> Option<u32> {
        if self.next_seq < self.total() && self.next_seq < self.base + self.window as u32 {
            let seq = self.next_seq;
            self.next_seq += 1;
            Some(seq)
        } else {
            None
        }
    }

    /// Payload bytes for `seq`, if the chunk has not been acknowledged yet.
    pub fn payload(&self, seq: u32) -> Option<&[u8]> {
        self.chunks.get(seq as usize)?.as_deref()
    }

    /// Process a cumulative ACK for `seq`.
    ///
    /// Advances `base` to `seq + 1`, drops the acknowledged chunks, and
    /// resets the retry counter.  Returns `true` when the window actually
    /// advanced.  Stale ACKs (`seq < base`) and ACKs for sequence numbers
    /// that were never sent (`seq ≥ next_seq`) are ignored.
    pub fn on_ack(&mut self, seq: u32) -> bool {
        if seq < self.base || seq >= self.next_seq {
            return false;
        }
        let new_base = seq + 1;
        for s in self.base..new_base {
            self.chunks[s as usize] = None;
        }
        self.base = new_base;
        self.retry_count = 0;
        true
    }

    /// Record a retransmit-timer expiry and return the new retry count.
    pub fn bump_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    /// Iterate over all outstanding packets from oldest to newest.
    ///
    /// Used by the transfer driver to retransmit the entire window on
    /// timeout (the "go back N" step).
    pub fn outstanding(&self) -> impl Iterator<Item = (u32, &[u8])> {
        (self.base..self.next_seq)
            .filter_map(|seq| self.payload(seq).map(|payload| (seq, payload)))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
