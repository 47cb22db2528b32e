//! # Game Client Library
//!
//! This library is the client core for a slither-style arena game. It turns the
//! binary frames a game server streams into a live world model, extrapolates that
//! model between updates so it can be presented at a fixed frame rate, and decides
//! which control bytes go back to the server.
//!
//! ## Architecture Overview
//!
//! Frames arrive on a reader task and are pushed onto a shared queue. A single tick
//! loop owns the world model: on every render tick it drains the queue, decodes
//! every frame, extrapolates positions and hands a detached snapshot to the
//! renderer. Nothing but the tick loop ever mutates the world model.
//!
//! ### Decoding
//! Every frame starts with a two byte client time and a one byte packet type. The
//! shared crate turns a frame into a typed packet first; only a fully decoded packet
//! is applied, so a truncated or garbled frame is logged and dropped without
//! touching the state.
//!
//! ### Dead Reckoning
//! Snake heads are projected from their last authoritative position along their
//! heading by their speed and the time since the update, shifted forward by half
//! the measured round trip. Prey bend their heading at a fixed angular rate while
//! turning.
//!
//! ### Controls
//! Heading, acceleration and ping bytes go out on their own schedule, rate limited
//! to one batch per 100 ms and only when something changed or a refresh is due.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The world model: snakes, food, prey, sectors, leaderboard, minimap, ping
//! tracking and score tables.
//!
//! ### Decoder Module (`decoder`)
//! Applies decoded packets to the world model.
//!
//! ### Motion Module (`motion`)
//! Snake and prey extrapolation.
//!
//! ### View Module (`view`)
//! Tracks the viewed region and maps between world and screen coordinates.
//!
//! ### Input Module (`input`)
//! Input sources and the outgoing control schedule.
//!
//! ### Rendering Module (`rendering`)
//! Render snapshots and the renderer seam, with a log based status renderer.
//!
//! ### Replay Module (`replay`)
//! Recording received frames and playing recordings back.
//!
//! ### Network Module (`network`)
//! Handshake, frame reader task, the frame queue and the tick loop.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::network::{Client, ClientConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     server: "127.0.0.1:8080".to_string(),
//!     nickname: "player".to_string(),
//!     ..ClientConfig::default()
//! };
//! let mut client = Client::new(config)?;
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod game;
pub mod input;
pub mod motion;
pub mod network;
pub mod rendering;
pub mod replay;
pub mod view;
