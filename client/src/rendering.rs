use crate::game::{body_part_radius, Food, GameState};
use crate::motion::MotionExtrapolator;
use log::info;
use shared::Coordinate;

/// Interval between status lines written by [`LogRenderer`].
pub const STATUS_PERIOD_US: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SnakeView {
    pub id: u16,
    pub name: String,
    pub head: Coordinate,
    /// Visible parts, head-ward last.
    pub body: Vec<Coordinate>,
    /// Part radius in screen pixels.
    pub radius: i32,
    pub skin: u8,
    pub mine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreyView {
    pub id: u16,
    pub xy: Coordinate,
    pub color: u8,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardLine {
    pub place: usize,
    pub name: String,
    pub score: i32,
}

/// Everything a renderer needs for one frame, detached from the state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub at_us: u64,
    pub view_center: Coordinate,
    pub scale: f32,
    pub snakes: Vec<SnakeView>,
    pub preys: Vec<PreyView>,
    pub foods: Vec<Food>,
    pub leaderboard: Vec<LeaderboardLine>,
    pub my_score: Option<i32>,
    pub rank: u16,
    pub player_count: u16,
    pub ping_us: u64,
    pub boundary_visible: bool,
    pub my_snake_dead: bool,
    pub minimap_cells: usize,
}

impl Snapshot {
    /// Capture the state after heads were advanced to `at_us`.
    ///
    /// The own snake comes first unless it is dead, followed by every other
    /// snake in order of first sighting.
    pub fn capture(state: &GameState, motion: &MotionExtrapolator, at_us: u64) -> Self {
        let mut ids = Vec::with_capacity(state.snake_order.len() + 1);
        if let Some(id) = state.my_snake_id {
            if !state.my_snake_dead() {
                ids.push(id);
            }
        }
        ids.extend(
            state
                .snake_order
                .iter()
                .copied()
                .filter(|id| Some(*id) != state.my_snake_id),
        );

        let snakes = ids
            .into_iter()
            .filter_map(|id| state.snakes.get(&id))
            .filter(|snake| !snake.body.is_empty())
            .map(|snake| {
                let visible = snake.length.min(snake.body.len());
                SnakeView {
                    id: snake.id,
                    name: snake.name.clone(),
                    head: snake.head,
                    body: snake.body.iter().skip(snake.body.len() - visible).copied().collect(),
                    radius: body_part_radius(snake.length, state.view.scale),
                    skin: snake.skin,
                    mine: Some(snake.id) == state.my_snake_id,
                }
            })
            .collect();

        let preys = state
            .preys
            .iter()
            .filter(|prey| !prey.eaten)
            .map(|prey| PreyView {
                id: prey.id,
                xy: motion.prey_position(prey, state.config.manu2, at_us),
                color: prey.color,
                size: prey.size,
            })
            .collect();

        let leaderboard = state
            .leaderboard
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| LeaderboardLine {
                place: idx + 1,
                name: entry.name.clone(),
                score: state.score.score(entry.body_part_count as usize, entry.fam),
            })
            .collect();

        Self {
            at_us,
            view_center: state.view.center,
            scale: state.view.scale,
            snakes,
            preys,
            foods: state.foods.iter().filter(|food| !food.eaten).copied().collect(),
            leaderboard,
            my_score: state.my_score(),
            rank: state.leaderboard.rank,
            player_count: state.leaderboard.player_count,
            ping_us: state.ping.average_rtt_us,
            boundary_visible: state.boundary_visible(),
            my_snake_dead: state.my_snake_dead(),
            minimap_cells: state.minimap.occupied(),
        }
    }
}

/// Presents snapshots.
pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot);

    /// False once the output is closed and the client should stop.
    fn is_open(&self) -> bool {
        true
    }
}

/// Renderer that writes a status line to the log once per period.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_status_us: Option<u64>,
    frames: u64,
    reported_death: bool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn status_line(snapshot: &Snapshot) -> String {
        let score = snapshot
            .my_score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "-".to_string());
        let leader = snapshot
            .leaderboard
            .first()
            .map(|line| format!("{} ({})", line.name, line.score))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "length {} rank {}/{} leader {} ping {}ms snakes {} prey {} food {}",
            score,
            snapshot.rank,
            snapshot.player_count,
            leader,
            snapshot.ping_us / 1000,
            snapshot.snakes.len(),
            snapshot.preys.len(),
            snapshot.foods.len()
        )
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &Snapshot) {
        self.frames += 1;
        if snapshot.my_snake_dead && !self.reported_death {
            info!("your snake is dead, final {}", Self::status_line(snapshot));
            self.reported_death = true;
        }

        let due = match self.last_status_us {
            Some(last) => snapshot.at_us.saturating_sub(last) >= STATUS_PERIOD_US,
            None => true,
        };
        if due {
            info!("{}", Self::status_line(snapshot));
            self.last_status_us = Some(snapshot.at_us);
        }
    }
}
