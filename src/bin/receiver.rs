//! Entry point for the receiving role.
//!
//! Parses CLI arguments and runs [`ruft::Receiver`] until ctrl-c.  Exit
//! codes: 0 clean shutdown, 1 bind or argument error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ruft::{Receiver, ReceiverConfig};

/// Receive files over reliable UDP into an output directory.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// UDP port to listen on.
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Directory receiving one file per session.
    #[arg(long, default_value = "./server_data")]
    out: PathBuf,

    /// Window size hint advertised to senders.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    window: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.use_stderr() {
                eprintln!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };

    let config = ReceiverConfig {
        port: cli.port,
        outdir: cli.out,
        window: cli.window,
        ..ReceiverConfig::default()
    };

    let mut receiver = match Receiver::bind(config).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("cannot bind receiver: {e}");
            return ExitCode::from(1);
        }
    };

    match receiver.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("receiver failed: {e}");
            ExitCode::from(1)
        }
    }
}
