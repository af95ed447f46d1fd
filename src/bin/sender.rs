//! Entry point for the sending role.
//!
//! Parses CLI arguments, resolves the peer, and delegates to
//! [`ruft::send_file`].  Exit codes: 0 success, 1 argument or I/O error,
//! 2 handshake failure, 3 transfer retries exhausted, 4 FIN unacknowledged.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use ruft::{send_file, SenderConfig};

/// Send one file to a receiver over reliable UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Receiver host name or address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Receiver UDP port.
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// File to transfer.
    #[arg(long)]
    file: PathBuf,

    /// DATA payload size in bytes.
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u16).range(1..))]
    chunk: u16,

    /// Window size in packets.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    window: u16,

    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Retry budget for handshake, data timeouts, and FIN.
    #[arg(long, default_value_t = 20)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Let clap render help/usage, but exit 1 on genuine argument
            // errors rather than clap's default 2.
            if e.use_stderr() {
                eprintln!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };

    let peer = match resolve(&cli.host, cli.port).await {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("cannot resolve {}:{}: {e}", cli.host, cli.port);
            return ExitCode::from(1);
        }
    };

    let config = SenderConfig {
        chunk: cli.chunk as usize,
        window: cli.window,
        timeout: Duration::from_millis(cli.timeout),
        max_retries: cli.max_retries,
    };

    match send_file(&cli.file, peer, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Resolve `host:port` to the first usable socket address.
async fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"))
}
