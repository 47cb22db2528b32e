//! Wire protocol, geometry and handshake primitives shared by the client
//! core and the replay server.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub mod geometry;
pub mod packet;
pub mod recording;
pub mod secret;
pub mod wire;

pub use geometry::{Coordinate, Rect};

pub const GAME_RADIUS: i32 = 21600;
pub const SECTOR_SIZE: i32 = 300;
/// Maximum snake length in body parts (mscps) until the server says otherwise.
pub const SNAKE_MAX_PART_COUNT: usize = 411;
pub const SNAKE_STEP_DISTANCE: i32 = 42;
/// Steps per second used when a snake has no reported speed.
pub const SNAKE_DEFAULT_SPEED: f32 = 4.0;
pub const SNAKE_SPEED_FACTOR: f32 = 0.6;
/// Stored body parts kept beyond the declared length.
pub const SAVE_PART_COUNT: usize = 40;
pub const TAIL_SQUEEZE_RATIO: f32 = 0.43;

pub const DRAW_FPS: u64 = 60;
pub const DRAW_PERIOD: Duration = Duration::from_micros(1_000_000 / DRAW_FPS);
pub const HEADING_REFRESH_PERIOD: Duration = Duration::from_millis(300);
pub const PING_PERIOD: Duration = Duration::from_millis(250);
pub const SEND_PERIOD_MIN: Duration = Duration::from_millis(100);

pub const MINIMAP_SIDE: usize = 80;
pub const LEADERBOARD_SIZE: usize = 10;
pub const PROTOCOL_ID: u8 = 10;

/// Microseconds elapsed since the first call in this process.
///
/// Monotonic; used for every authoritative and render timestamp so recorded
/// sessions replay with the same pacing they were captured with.
pub fn uptime_us() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_micros().min(u64::MAX as u128) as u64
}
