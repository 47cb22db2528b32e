use clap::Parser;
use log::info;
use server::network::Server;
use server::playback::Recording;
use std::path::PathBuf;

/// Main-method of the replay server.
/// Parses command-line arguments, loads the recording and serves it until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Recording to serve
        #[clap(short = 'f', long)]
        play_file: PathBuf,
        /// Maximum number of concurrent viewers
        #[clap(short, long, default_value = "16")]
        max_viewers: usize,
        /// Require viewers to answer the connection challenge
        #[clap(short, long)]
        challenge: bool,
    }

    let args = Args::parse();

    let recording = Recording::load(&args.play_file)?;
    if recording.is_empty() {
        info!("Recording {} has no frames", args.play_file.display());
    }

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, recording, args.max_viewers, args.challenge).await?;
    server.run().await
}
