use crate::game::GameState;
use log::{debug, info, trace, warn};
use shared::packet::{DecodeError, Packet};

/// Applies server frames to a [`GameState`].
///
/// Decoding happens first and in full, so a malformed frame is dropped
/// with one log line and never leaves the state half-updated.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketDecoder {
    pub applied: u64,
    pub dropped: u64,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `frame` and apply it. Returns true when the frame changed
    /// (or could have changed) the state.
    pub fn handle(&mut self, state: &mut GameState, frame: &[u8], now_us: u64) -> bool {
        let packet = match Packet::decode(frame) {
            Ok(packet) => packet,
            Err(DecodeError::UnknownType(kind)) => {
                debug!("ignoring packet type {:#04x}", kind);
                self.dropped += 1;
                return false;
            }
            Err(e) => {
                warn!("dropping frame: {}", e);
                self.dropped += 1;
                return false;
            }
        };
        self.applied += 1;
        state.has_data = true;
        apply(state, packet, now_us);
        true
    }
}

fn apply(state: &mut GameState, packet: Packet, now_us: u64) {
    let cst = state.config.cst;
    match packet {
        Packet::Init(init) => state.apply_init(&init),
        Packet::SectorAdd { x, y } => state.add_sector(x, y),
        Packet::SectorRemove { x, y } => state.remove_sector(x, y),
        Packet::FoodSet { foods, remainder } => {
            if remainder != 0 {
                warn!("food set carries {} trailing bytes", remainder);
            }
            trace!("food set with {} records", foods.len());
            state.add_foods(&foods);
        }
        Packet::FoodAdd(food) => {
            state.add_food(food);
        }
        Packet::FoodEat { xy, snake_id } => {
            let eaten = state.eat_food(xy);
            trace!("snake {} ate {} food at {}", snake_id, eaten, xy);
        }
        Packet::Move { id, xy } => {
            state.establish_my_snake(id);
            state.snake_mut(id).move_to(xy, now_us, cst);
        }
        Packet::MoveRelative { id, dx, dy } => {
            let snake = state.snake_mut(id);
            let head = match snake.last_part() {
                Some(head) if snake.length > 0 => head,
                _ => {
                    debug!("relative move for empty snake {}", id);
                    return;
                }
            };
            snake.move_to(head.offset(dx, dy), now_us, cst);
        }
        Packet::MoveRelativeGrow { id, dx, dy, fam } => {
            let snake = state.snake_mut(id);
            snake.length += 1;
            snake.fam = fam;
            match snake.last_part() {
                Some(head) => snake.move_to(head.offset(dx, dy), now_us, cst),
                None => debug!("relative growth for empty snake {}", id),
            }
        }
        Packet::MoveGrow { id, xy, fam } => {
            let snake = state.snake_mut(id);
            snake.length += 1;
            snake.fam = fam;
            snake.move_to(xy, now_us, cst);
        }
        Packet::FamUpdate { id, fam } => {
            state.snake_mut(id).fam = fam;
        }
        Packet::RemovePart { id, fam } => {
            let snake = state.snake_mut(id);
            snake.fam = fam;
            snake.remove_part();
        }
        Packet::Rotate { id, rotation } => {
            state.snake_mut(id).apply_rotation(&rotation);
        }
        Packet::SnakeRemove { id, died } => state.remove_snake(id, died),
        Packet::SnakeData(snapshot) => state.apply_snapshot(snapshot, now_us),
        Packet::PreyAdd(record) => {
            let id = record.id;
            if !state.add_prey(record, now_us) {
                debug!("prey {} already tracked", id);
            }
        }
        Packet::PreyEat { id, snake_id } => {
            if state.mark_prey_eaten(id) {
                trace!("snake {} ate prey {}", snake_id, id);
            } else {
                warn!("eat for unknown prey {}", id);
            }
        }
        Packet::PreyRemove { id } => {
            if !state.mark_prey_eaten(id) {
                warn!("removal of unknown prey {}", id);
            }
        }
        Packet::PreyUpdate { id, xy, motion } => {
            if !state.update_prey(id, xy, &motion, now_us) {
                warn!("update for unknown prey {}", id);
            }
        }
        Packet::Minimap(cells) => state.minimap.replace(cells),
        Packet::Leaderboard(board) => state.leaderboard.replace(board),
        Packet::Pong => {
            if let Some(rtt) = state.ping.complete(now_us) {
                trace!("ping {} us, average {} us", rtt, state.ping.average_rtt_us);
            }
        }
        Packet::Death { reason } => {
            info!("game over, reason {}", reason);
            state.kill_my_snake();
        }
        Packet::Challenge => debug!("challenge after handshake ignored"),
    }
}
