use crate::view::ViewState;
use log::{debug, info, warn};
use shared::geometry::{angle_between, circle_points, distance};
use shared::packet::{
    FoodRecord, InitPacket, LeaderboardEntry, LeaderboardPacket, PreyRecord, RotationDirection,
    SnakeRotation, SnakeSnapshot,
};
use shared::{
    Coordinate, GAME_RADIUS, MINIMAP_SIDE, SAVE_PART_COUNT, SECTOR_SIZE, SNAKE_MAX_PART_COUNT,
    TAIL_SQUEEZE_RATIO,
};
use std::collections::{HashMap, VecDeque};

/// Number of points in the world boundary polygon.
pub const BOUNDARY_POINTS: usize = 360;

/// World parameters, replaced wholesale by the init packet.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub game_radius: i32,
    pub mscps: usize,
    pub sector_size: i32,
    pub spangdv: f32,
    pub nsp1: f32,
    pub nsp2: f32,
    pub nsp3: f32,
    pub mamu: f32,
    /// Prey turn rate in radians per 8 ms.
    pub manu2: f32,
    /// Tail squeeze ratio.
    pub cst: f32,
    pub protocol_version: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            game_radius: GAME_RADIUS,
            mscps: SNAKE_MAX_PART_COUNT,
            sector_size: SECTOR_SIZE,
            spangdv: 4.8,
            nsp1: 4.25,
            nsp2: 0.5,
            nsp3: 12.0,
            mamu: 0.033,
            manu2: 0.028,
            cst: TAIL_SQUEEZE_RATIO,
            protocol_version: 0,
        }
    }
}

impl GameConfig {
    /// Returns true when the boundary geometry has to be rebuilt.
    pub fn apply(&mut self, init: &InitPacket) -> bool {
        let geometry_changed =
            self.game_radius != init.game_radius || self.sector_size != init.sector_size;
        self.game_radius = init.game_radius;
        self.mscps = init.mscps;
        self.sector_size = init.sector_size;
        self.spangdv = init.spangdv;
        self.nsp1 = init.nsp1;
        self.nsp2 = init.nsp2;
        self.nsp3 = init.nsp3;
        self.mamu = init.mamu;
        self.manu2 = init.manu2;
        self.cst = init.cst;
        self.protocol_version = init.protocol_version;
        geometry_changed
    }
}

#[derive(Debug, Clone)]
pub struct Snake {
    pub id: u16,
    /// Declared length in body parts, as reported by the server.
    pub length: usize,
    /// Stored body, tail at the front and newest head sample at the back.
    pub body: VecDeque<Coordinate>,
    /// Rendered head; leads the body while extrapolating.
    pub head: Coordinate,
    pub angle: Option<f32>,
    pub wangle: Option<f32>,
    pub speed: Option<f32>,
    pub direction: RotationDirection,
    pub fam: f32,
    pub skin: u8,
    pub name: String,
    pub dead: bool,
    pub updated_us: u64,
    pub drawn_us: u64,
}

impl Snake {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            length: 0,
            body: VecDeque::new(),
            head: Coordinate::default(),
            angle: None,
            wangle: None,
            speed: None,
            direction: RotationDirection::None,
            fam: 0.0,
            skin: 0,
            name: String::new(),
            dead: false,
            updated_us: 0,
            drawn_us: 0,
        }
    }

    /// Latest authoritative head sample.
    pub fn last_part(&self) -> Option<Coordinate> {
        self.body.back().copied()
    }

    /// Direction of the newest body segment.
    pub fn heading(&self) -> Option<f32> {
        let len = self.body.len();
        if len < 2 {
            return None;
        }
        Some(angle_between(self.body[len - 2], self.body[len - 1]))
    }

    /// Append an authoritative head position.
    pub fn move_to(&mut self, xy: Coordinate, now_us: u64, squeeze_ratio: f32) {
        if let Some(prev) = self.last_part() {
            debug!(
                "snake {} moved {} units after {} us",
                self.id,
                distance(prev, xy),
                now_us.saturating_sub(self.updated_us)
            );
        }
        self.body.push_back(xy);
        self.head = xy;
        self.updated_us = now_us;
        self.squeeze(squeeze_ratio);
        self.trim();
    }

    /// Pull the parts behind the neck toward their head-ward neighbour.
    ///
    /// Counting from the head, part `k >= 3` moves by `ratio * min(k, 4) / 4`
    /// of the gap, nearest parts first.
    pub fn squeeze(&mut self, ratio: f32) {
        let len = self.body.len();
        if len < 4 {
            return;
        }
        for k in 3..len {
            let weight = ratio * k.min(4) as f32 / 4.0;
            let pos = len - 1 - k;
            let next = self.body[pos + 1];
            let part = &mut self.body[pos];
            part.x = (part.x as f32 + (next.x - part.x) as f32 * weight) as i32;
            part.y = (part.y as f32 + (next.y - part.y) as f32 * weight) as i32;
        }
    }

    /// Drop the oldest parts beyond `length + SAVE_PART_COUNT`.
    pub fn trim(&mut self) {
        let keep = self.length + SAVE_PART_COUNT;
        while self.body.len() > keep {
            self.body.pop_front();
        }
    }

    /// Shrink by one declared part. Returns false if already empty.
    pub fn remove_part(&mut self) -> bool {
        if self.length == 0 {
            return false;
        }
        self.length -= 1;
        if self.body.len() > self.length {
            self.body.pop_front();
        }
        self.trim();
        true
    }

    pub fn apply_rotation(&mut self, rotation: &SnakeRotation) {
        if let Some(angle) = rotation.angle {
            self.angle = Some(angle);
        }
        if let Some(wangle) = rotation.wangle {
            self.wangle = Some(wangle);
        }
        if let Some(speed) = rotation.speed {
            self.speed = Some(speed);
        }
        if let Some(direction) = rotation.direction {
            self.direction = direction;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Food {
    pub xy: Coordinate,
    pub color: u8,
    pub size: i32,
    pub eaten: bool,
}

impl From<FoodRecord> for Food {
    fn from(record: FoodRecord) -> Self {
        Self {
            xy: record.xy,
            color: record.color,
            size: record.size,
            eaten: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prey {
    pub id: u16,
    pub xy: Coordinate,
    pub prev_xy: Coordinate,
    pub color: u8,
    pub size: i32,
    pub angle: f32,
    pub wangle: f32,
    pub speed: f32,
    pub direction: RotationDirection,
    pub eaten: bool,
    pub updated_us: u64,
}

impl Prey {
    pub fn from_record(record: PreyRecord, now_us: u64) -> Self {
        Self {
            id: record.id,
            xy: record.xy,
            prev_xy: record.xy,
            color: record.color,
            size: record.size,
            angle: record.angle,
            wangle: record.wangle,
            speed: record.speed,
            direction: record.direction,
            eaten: false,
            updated_us: now_us,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    pub rank_in_leaderboard: u8,
    pub rank: u16,
    pub player_count: u16,
    pub entries: Vec<LeaderboardEntry>,
    pub has_data: bool,
}

impl Leaderboard {
    pub fn replace(&mut self, packet: LeaderboardPacket) {
        self.rank_in_leaderboard = packet.rank_in_leaderboard;
        self.rank = packet.rank;
        self.player_count = packet.player_count;
        self.entries = packet.entries;
        self.has_data = true;
    }
}

/// Round-trip tracking for the ping control.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingContext {
    pub awaiting_pong: bool,
    pub sent_us: u64,
    pub rtt_us: u64,
    pub average_rtt_us: u64,
}

impl PingContext {
    pub fn start(&mut self, now_us: u64) {
        self.sent_us = now_us;
        self.awaiting_pong = true;
    }

    /// Returns the new sample, or `None` if no ping was outstanding.
    pub fn complete(&mut self, now_us: u64) -> Option<u64> {
        if !self.awaiting_pong {
            return None;
        }
        self.awaiting_pong = false;
        self.rtt_us = now_us.saturating_sub(self.sent_us);
        self.average_rtt_us = (self.average_rtt_us + self.rtt_us) / 2;
        Some(self.rtt_us)
    }

    /// One-way delay estimate applied to extrapolation.
    pub fn network_delay_us(&self) -> u64 {
        self.average_rtt_us / 2
    }
}

#[derive(Debug, Clone)]
pub struct Minimap {
    cells: Vec<bool>,
}

impl Default for Minimap {
    fn default() -> Self {
        Self {
            cells: vec![false; MINIMAP_SIDE * MINIMAP_SIDE],
        }
    }
}

impl Minimap {
    pub fn replace(&mut self, cells: Vec<bool>) {
        if cells.len() != MINIMAP_SIDE * MINIMAP_SIDE {
            warn!("minimap with {} cells ignored", cells.len());
            return;
        }
        self.cells = cells;
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        x < MINIMAP_SIDE && y < MINIMAP_SIDE && self.cells[y * MINIMAP_SIDE + x]
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }
}

/// Length score lookup, rebuilt whenever mscps changes.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    mscps: usize,
    fmlts: Vec<f32>,
    fpsls: Vec<f32>,
}

impl ScoreTable {
    const PADDING: usize = 2048;

    pub fn new(mscps: usize) -> Self {
        let mut table = ScoreTable::default();
        table.rebuild(mscps);
        table
    }

    pub fn set_mscps(&mut self, mscps: usize) {
        if mscps != self.mscps || self.fmlts.is_empty() {
            self.rebuild(mscps);
        }
    }

    fn rebuild(&mut self, mscps: usize) {
        self.mscps = mscps;
        self.fmlts.clear();
        self.fpsls.clear();
        for b in 0..=mscps {
            let fmlt = if b < mscps {
                (1.0 - b as f64 / mscps as f64).powf(2.25) as f32
            } else {
                self.fmlts.last().copied().unwrap_or(1.0)
            };
            let fpsl = match b {
                0 => 0.0,
                _ => self.fpsls[b - 1] + 1.0 / self.fmlts[b - 1],
            };
            self.fmlts.push(fmlt);
            self.fpsls.push(fpsl);
        }
        let last_fmlt = self.fmlts[mscps];
        let last_fpsl = self.fpsls[mscps];
        self.fmlts.extend(std::iter::repeat(last_fmlt).take(Self::PADDING));
        self.fpsls.extend(std::iter::repeat(last_fpsl).take(Self::PADDING));
    }

    pub fn score(&self, parts: usize, fam: f32) -> i32 {
        match (self.fpsls.get(parts), self.fmlts.get(parts)) {
            (Some(fpsl), Some(fmlt)) => (15.0 * (fpsl + fam / fmlt - 1.0) - 5.0).floor() as i32,
            _ => 0,
        }
    }
}

/// Pixel radius of one body part at the given view scale.
pub fn body_part_radius(parts: usize, scale: f32) -> i32 {
    let sc = (1.0 + (parts as f32 - 2.0) / 106.0).min(6.0);
    (29.0 * 0.5 * sc * scale) as i32
}

/// The client's model of the world.
///
/// Only the frame consumer mutates it: packets through the decoder, and
/// the render tick through [`GameState::refresh_view`] and
/// [`GameState::maintain`].
#[derive(Debug, Clone)]
pub struct GameState {
    pub config: GameConfig,
    pub my_snake_id: Option<u16>,
    pub snakes: HashMap<u16, Snake>,
    /// Snakes with a full snapshot, in order of first sighting.
    pub snake_order: Vec<u16>,
    pub sectors: Vec<Coordinate>,
    pub foods: Vec<Food>,
    pub preys: Vec<Prey>,
    pub minimap: Minimap,
    pub boundary: Vec<Coordinate>,
    pub leaderboard: Leaderboard,
    pub score: ScoreTable,
    pub ping: PingContext,
    pub view: ViewState,
    /// Set by every decoded packet, cleared by the render tick.
    pub has_data: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        let config = GameConfig::default();
        let mut state = Self {
            score: ScoreTable::new(config.mscps),
            view: ViewState::new(config.game_radius),
            config,
            my_snake_id: None,
            snakes: HashMap::new(),
            snake_order: Vec::new(),
            sectors: Vec::new(),
            foods: Vec::new(),
            preys: Vec::new(),
            minimap: Minimap::default(),
            boundary: Vec::new(),
            leaderboard: Leaderboard::default(),
            ping: PingContext::default(),
            has_data: false,
        };
        state.rebuild_boundary();
        state
    }

    /// True once the locally controlled snake is known.
    pub fn ready(&self) -> bool {
        self.my_snake_id.is_some()
    }

    pub fn apply_init(&mut self, init: &InitPacket) {
        info!(
            "world radius {} sector size {} mscps {} protocol {}",
            init.game_radius, init.sector_size, init.mscps, init.protocol_version
        );
        let geometry_changed = self.config.apply(init);
        self.score.set_mscps(self.config.mscps);
        if geometry_changed {
            self.rebuild_boundary();
        }
    }

    fn rebuild_boundary(&mut self) {
        let radius = self.config.game_radius;
        let center = Coordinate::new(radius, radius);
        self.boundary = circle_points(center, radius - self.config.sector_size, BOUNDARY_POINTS);
    }

    pub fn add_sector(&mut self, x: u8, y: u8) {
        self.sectors.push(Coordinate::new(x as i32, y as i32));
    }

    pub fn remove_sector(&mut self, x: u8, y: u8) {
        let sector = Coordinate::new(x as i32, y as i32);
        self.sectors.retain(|s| *s != sector);
    }

    pub fn add_foods(&mut self, records: &[FoodRecord]) {
        self.foods.extend(records.iter().copied().map(Food::from));
    }

    /// Add a single food unless one already sits at the same coordinate.
    pub fn add_food(&mut self, record: FoodRecord) -> bool {
        if self.foods.iter().any(|food| food.xy == record.xy) {
            return false;
        }
        self.foods.push(Food::from(record));
        true
    }

    pub fn eat_food(&mut self, xy: Coordinate) -> usize {
        let mut eaten = 0;
        for food in self.foods.iter_mut().filter(|food| food.xy == xy) {
            food.eaten = true;
            eaten += 1;
        }
        eaten
    }

    /// Fetch a snake, creating an empty one on first reference.
    pub fn snake_mut(&mut self, id: u16) -> &mut Snake {
        self.snakes.entry(id).or_insert_with(|| Snake::new(id))
    }

    pub fn my_snake(&self) -> Option<&Snake> {
        self.my_snake_id.and_then(|id| self.snakes.get(&id))
    }

    pub fn my_snake_dead(&self) -> bool {
        self.my_snake().map(|snake| snake.dead).unwrap_or(false)
    }

    /// First caller wins; later ids are ignored.
    pub fn establish_my_snake(&mut self, id: u16) {
        if self.my_snake_id.is_none() {
            info!("controlling snake {}", id);
            self.my_snake_id = Some(id);
        }
    }

    /// Apply a removal record. The local snake is only marked dead so
    /// its final state stays visible.
    pub fn remove_snake(&mut self, id: u16, died: bool) {
        if died {
            self.snake_mut(id).dead = true;
        }
        if self.my_snake_id == Some(id) {
            if died {
                info!("own snake {} died", id);
            }
            return;
        }
        self.snakes.remove(&id);
        self.snake_order.retain(|other| *other != id);
    }

    pub fn apply_snapshot(&mut self, snapshot: SnakeSnapshot, now_us: u64) {
        let id = snapshot.id;
        let mut snake = Snake::new(id);
        snake.angle = Some(snapshot.angle);
        snake.wangle = Some(snapshot.wangle);
        snake.speed = Some(snapshot.speed);
        snake.fam = snapshot.fam;
        snake.skin = snapshot.skin;
        snake.name = snapshot.name;
        snake.body = snapshot.body.into_iter().collect();
        snake.length = snake.body.len();
        snake.head = snake.last_part().unwrap_or_default();
        snake.updated_us = now_us;
        debug!(
            "snake {} '{}' snapshot with {} parts at {}",
            id,
            snake.name,
            snake.length,
            snake.head
        );
        self.snakes.insert(id, snake);

        if !self.snake_order.contains(&id) {
            self.snake_order.push(id);
        }
        self.establish_my_snake(id);
    }

    pub fn find_prey_mut(&mut self, id: u16) -> Option<&mut Prey> {
        self.preys.iter_mut().find(|prey| prey.id == id)
    }

    /// Track a new prey; an id already tracked is left untouched.
    pub fn add_prey(&mut self, record: PreyRecord, now_us: u64) -> bool {
        if self.preys.iter().any(|prey| prey.id == record.id) {
            return false;
        }
        self.preys.push(Prey::from_record(record, now_us));
        true
    }

    pub fn mark_prey_eaten(&mut self, id: u16) -> bool {
        match self.find_prey_mut(id) {
            Some(prey) => {
                prey.eaten = true;
                true
            }
            None => false,
        }
    }

    pub fn update_prey(&mut self, id: u16, xy: Coordinate, motion: &SnakeRotation, now_us: u64) -> bool {
        let prey = match self.find_prey_mut(id) {
            Some(prey) => prey,
            None => return false,
        };
        prey.prev_xy = prey.xy;
        prey.xy = xy;
        prey.updated_us = now_us;
        if let Some(angle) = motion.angle {
            prey.angle = angle;
        }
        if let Some(wangle) = motion.wangle {
            prey.wangle = wangle;
        }
        if let Some(speed) = motion.speed {
            prey.speed = speed;
        }
        if let Some(direction) = motion.direction {
            prey.direction = direction;
        }
        true
    }

    pub fn kill_my_snake(&mut self) {
        if let Some(id) = self.my_snake_id {
            self.snake_mut(id).dead = true;
            info!("own snake {} ended", id);
        }
    }

    /// Recompute the view from the current sectors and own head.
    /// Returns true if the view center moved.
    pub fn refresh_view(&mut self) -> bool {
        let center = self.my_snake().map(|snake| snake.head);
        self.view.update(center, &self.sectors, self.config.sector_size, self.config.game_radius)
    }

    /// Render-tick cleanup: drop eaten food and prey, and food that left
    /// the streamed sectors.
    pub fn maintain(&mut self) {
        self.foods.retain(|food| !food.eaten);
        self.preys.retain(|prey| !prey.eaten);
        if !self.sectors.is_empty() {
            let rect = self.view.sector_rect;
            self.foods.retain(|food| rect.contains(food.xy));
        }
    }

    pub fn my_score(&self) -> Option<i32> {
        self.my_snake()
            .map(|snake| self.score.score(snake.length, snake.fam))
    }

    /// Whether the world edge may be inside the current view.
    pub fn boundary_visible(&self) -> bool {
        let center = self.view.center;
        let radius = self.config.game_radius;
        let world_center = Coordinate::new(radius, radius);
        distance(center, world_center) >= radius - self.view.view_radius()
    }
}
