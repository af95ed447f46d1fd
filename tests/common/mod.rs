//! Shared helpers for the integration tests: scratch directories, a
//! deterministic payload generator, a receiver task spawner, and a
//! fault-injecting UDP relay for loss/corruption scenarios.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use ruft::packet::{Packet, HEADER_LEN};
use ruft::{Receiver, ReceiverConfig};

/// Fresh scratch directory under the system temp dir, unique per test.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ruft-it-{}-{tag}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write `bytes` to a scratch file named `name` and return its path.
pub fn write_source(dir: &PathBuf, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Deterministic non-repeating payload so misplaced chunks are caught.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect()
}

/// All regular files in `dir`, sorted by path.
pub fn files_in(dir: &PathBuf) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Spawn a receiver on an OS-assigned loopback port.
///
/// Returns the address senders should target and the task handle (abort it
/// to simulate a receiver crash).
pub async fn start_receiver(
    outdir: PathBuf,
    window: u16,
    max_sessions: usize,
) -> (SocketAddr, JoinHandle<()>) {
    let mut receiver = Receiver::bind(ReceiverConfig {
        port: 0,
        outdir,
        window,
        max_sessions,
    })
    .await
    .expect("bind receiver");

    let port = receiver.local_addr().port();
    let handle = tokio::spawn(async move {
        let _ = receiver.run().await;
    });
    (SocketAddr::from(([127, 0, 0, 1], port)), handle)
}

// ---------------------------------------------------------------------------
// Fault-injecting relay
// ---------------------------------------------------------------------------

/// Which way a datagram is travelling through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sender → receiver (HANDSHAKE, DATA, FIN).
    ToReceiver,
    /// Receiver → sender (HANDSHAKE_ACK, ACK, FIN_ACK, ERROR).
    ToSender,
}

/// What the relay does with one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Drop,
    /// Forward with one payload bit flipped (header left intact).
    CorruptPayload,
}

/// Start a loopback UDP relay in front of `receiver`.
///
/// Every decodable datagram is shown to `fault`, which decides its fate;
/// undecodable datagrams pass through untouched.  The first peer that is not
/// the receiver is remembered as the sender, so exactly one transfer may run
/// through a relay at a time.
pub async fn spawn_relay<F>(receiver: SocketAddr, mut fault: F) -> SocketAddr
where
    F: FnMut(Direction, &Packet) -> Action + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut sender_addr: Option<SocketAddr> = None;
        let mut buf = vec![0u8; 65_535];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let (direction, dest) = if from == receiver {
                match sender_addr {
                    Some(s) => (Direction::ToSender, s),
                    None => continue,
                }
            } else {
                sender_addr = Some(from);
                (Direction::ToReceiver, receiver)
            };

            let action = match Packet::decode(&buf[..n]) {
                Ok(pkt) => fault(direction, &pkt),
                Err(_) => Action::Forward,
            };
            match action {
                Action::Drop => {}
                Action::Forward => {
                    let _ = socket.send_to(&buf[..n], dest).await;
                }
                Action::CorruptPayload => {
                    if n > HEADER_LEN {
                        buf[n - 1] ^= 0x01;
                    }
                    let _ = socket.send_to(&buf[..n], dest).await;
                }
            }
        }
    });
    addr
}
