use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game or replay server address
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nickname shown on the leaderboard
    #[arg(short = 'n', long, default_value = "")]
    nickname: String,

    /// Skin index
    #[arg(long, default_value = "0")]
    skin: u8,

    /// Record every received frame to this file
    #[arg(short = 'r', long)]
    record_file: Option<PathBuf>,

    /// Replay a recorded session instead of connecting
    #[arg(short = 'p', long, conflicts_with = "record_file")]
    play_file: Option<PathBuf>,

    /// Viewport width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Viewport height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    match &args.play_file {
        Some(path) => info!("Replaying {}", path.display()),
        None => info!("Connecting to: {}", args.server),
    }
    if let Some(path) = &args.record_file {
        info!("Recording to {}", path.display());
    }

    let config = ClientConfig {
        server: args.server,
        nickname: args.nickname,
        skin: args.skin,
        record_file: args.record_file,
        play_file: args.play_file,
        width: args.width,
        height: args.height,
    };

    let mut client = Client::new(config)?;
    client.run().await?;

    Ok(())
}
