//! Loss and corruption scenarios, driven through the fault-injecting relay.
//!
//! The relay sits between sender and receiver on loopback and drops or
//! corrupts selected datagrams; every test then asserts the transfer still
//! completes and the sink is byte-identical to the source.

use std::collections::HashSet;
use std::time::Duration;

use ruft::packet::PacketType;
use ruft::{send_file, SenderConfig};

mod common;
use common::{
    files_in, pattern, scratch_dir, spawn_relay, start_receiver, write_source, Action, Direction,
};

fn config() -> SenderConfig {
    SenderConfig {
        chunk: 256,
        window: 4,
        timeout: Duration::from_millis(100),
        max_retries: 10,
    }
}

// ---------------------------------------------------------------------------
// Test 1: a single lost DATA packet is retransmitted (Go-Back-N)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lost_data_packet_is_recovered() {
    let dir = scratch_dir("lossy-data");
    let outdir = dir.join("out");
    let source = pattern(1024);
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    let mut dropped = false;
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToReceiver
            && pkt.header.ptype == PacketType::Data
            && pkt.header.seq == 1
            && !dropped
        {
            dropped = true;
            return Action::Drop;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    let files = files_in(&outdir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), source);

    receiver.abort();
}

// ---------------------------------------------------------------------------
// Test 2: a whole round of lost ACKs forces a timeout; duplicates are benign
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lost_acks_trigger_idempotent_redelivery() {
    let dir = scratch_dir("lossy-ack");
    let outdir = dir.join("out");
    let source = pattern(1024);
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    // Swallow the first four ACKs: the receiver has committed the whole
    // window, but the sender must time out and redeliver all of it.
    let mut remaining = 4u32;
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToSender
            && pkt.header.ptype == PacketType::Ack
            && remaining > 0
        {
            remaining -= 1;
            return Action::Drop;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    let files = files_in(&outdir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), source);

    receiver.abort();
}

// ---------------------------------------------------------------------------
// Test 3: a corrupted payload is dropped by checksum and retransmitted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupted_payload_is_recovered() {
    let dir = scratch_dir("lossy-crc");
    let outdir = dir.join("out");
    let source = pattern(1024);
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    let mut corrupted = false;
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToReceiver
            && pkt.header.ptype == PacketType::Data
            && pkt.header.seq == 2
            && !corrupted
        {
            corrupted = true;
            return Action::CorruptPayload;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    let files = files_in(&outdir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), source);

    receiver.abort();
}

// ---------------------------------------------------------------------------
// Test 4: lost HANDSHAKE_ACK — the repeat handshake replaces the session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lost_handshake_ack_leaves_stale_sink_behind() {
    let dir = scratch_dir("lossy-hsack");
    let outdir = dir.join("out");
    let source = pattern(1024);
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    let mut dropped = false;
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToSender
            && pkt.header.ptype == PacketType::HandshakeAck
            && !dropped
        {
            dropped = true;
            return Action::Drop;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    // The first handshake created a session whose ACK never arrived; the
    // retransmitted handshake replaced it.  Both sinks persist: the stale
    // one empty, the live one complete.
    let files = files_in(&outdir);
    assert_eq!(files.len(), 2, "expected stale and live sinks");
    let mut sizes: Vec<u64> = files
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().len())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes[0], 0);
    assert_eq!(sizes[1], source.len() as u64);

    let complete = files
        .iter()
        .find(|p| std::fs::metadata(p).unwrap().len() > 0)
        .unwrap();
    assert_eq!(std::fs::read(complete).unwrap(), source);

    receiver.abort();
}

// ---------------------------------------------------------------------------
// Test 5: lost FIN_ACK — the repeated FIN is acknowledged without a session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lost_fin_ack_still_terminates() {
    let dir = scratch_dir("lossy-finack");
    let outdir = dir.join("out");
    let source = pattern(512);
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    let mut dropped = false;
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToSender
            && pkt.header.ptype == PacketType::FinAck
            && !dropped
        {
            dropped = true;
            return Action::Drop;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    let files = files_in(&outdir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), source);

    receiver.abort();
}

// ---------------------------------------------------------------------------
// Test 6: scattered first-transmission losses across a longer transfer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scattered_losses_are_recovered() {
    let dir = scratch_dir("lossy-scatter");
    let outdir = dir.join("out");
    let source = pattern(2048); // 8 packets of 256
    let file = write_source(&dir, "f.bin", &source);

    let (addr, receiver) = start_receiver(outdir.clone(), 4, 100).await;

    // Drop the first transmission of seq 1, 3, and 5; retransmissions pass.
    let mut pending: HashSet<u32> = [1, 3, 5].into_iter().collect();
    let relay = spawn_relay(addr, move |direction, pkt| {
        if direction == Direction::ToReceiver
            && pkt.header.ptype == PacketType::Data
            && pending.remove(&pkt.header.seq)
        {
            return Action::Drop;
        }
        Action::Forward
    })
    .await;

    send_file(&file, relay, &config()).await.expect("transfer failed");

    let files = files_in(&outdir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), source);

    receiver.abort();
}
