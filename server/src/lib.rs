//! # Replay Server Library
//!
//! This library serves recorded game sessions to clients over TCP. A viewer
//! connects exactly as it would to a live game server, completes the same
//! handshake, and then receives the recorded frames with their original
//! spacing. Clients need no special mode to watch a replay.
//!
//! ## Core Responsibilities
//!
//! ### Session Handshake
//! Every connection starts with the hello frame. When the challenge is
//! enabled the server sends a randomly generated `'6'` frame and checks the
//! 24-byte answer before accepting the login frame, which lets the real
//! client's solver be exercised end to end.
//!
//! ### Paced Delivery
//! Recorded timestamps are rebased to the first frame of the recording and
//! each viewer's stream starts at its own clock. Frames due within the
//! batching threshold are held and written together with the next frame that
//! needs a wait, so bursts recorded together arrive together.
//!
//! ### Viewer Management
//! Tracks connected viewers against a capacity limit and keeps per-viewer
//! counters for frames sent and control messages received.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Viewer admission, login details and delivery statistics.
//!
//! ### Network Module (`network`)
//! TCP accept loop, handshake, and the per-viewer streaming task.
//!
//! ### Playback Module (`playback`)
//! Loading recordings from disk and grouping frames into write bursts.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::playback::Recording;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recording = Recording::load("session.rec")?;
//!
//!     // Up to 8 concurrent viewers, with the connection challenge enabled
//!     let server = Server::new("127.0.0.1:8080", recording, 8, true).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod playback;
