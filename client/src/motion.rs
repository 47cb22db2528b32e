//! Dead reckoning for snake heads and prey between server updates.

use crate::game::{GameState, Prey, Snake};
use log::trace;
use shared::geometry::{normalize_angle, project};
use shared::packet::RotationDirection;
use shared::{Coordinate, SNAKE_DEFAULT_SPEED, SNAKE_SPEED_FACTOR, SNAKE_STEP_DISTANCE};

/// Upper bound on extrapolated prey speed, in world units per second.
pub const PREY_SPEED_CAP: f32 = 200.0;

const US_PER_SECOND: f32 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionExtrapolator {
    /// Steps per second used when a snake has not reported a speed.
    pub default_speed: f32,
    pub speed_factor: f32,
    pub prey_speed_cap: f32,
}

impl Default for MotionExtrapolator {
    fn default() -> Self {
        Self {
            default_speed: SNAKE_DEFAULT_SPEED,
            speed_factor: SNAKE_SPEED_FACTOR,
            prey_speed_cap: PREY_SPEED_CAP,
        }
    }
}

impl MotionExtrapolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// World units per second for a snake.
    pub fn snake_speed(&self, snake: &Snake) -> f32 {
        let step = SNAKE_STEP_DISTANCE as f32;
        match snake.speed {
            Some(speed) => speed * step * self.speed_factor,
            None => self.default_speed * step,
        }
    }

    /// Rendered head of `snake` at `at_us`.
    ///
    /// Returns `None` for dead snakes and snakes without a body. When no
    /// time has passed, or the projected distance rounds to zero, the last
    /// authoritative sample is returned unchanged.
    pub fn snake_head(&self, snake: &Snake, at_us: u64) -> Option<Coordinate> {
        if snake.dead {
            return None;
        }
        let last = snake.last_part()?;
        let delta_us = at_us.saturating_sub(snake.updated_us);
        if delta_us == 0 {
            return Some(last);
        }

        let delta_distance = (self.snake_speed(snake) * delta_us as f32 / US_PER_SECOND) as i32;
        if delta_distance == 0 {
            return Some(last);
        }

        let angle = match snake.angle.map(normalize_angle).or_else(|| snake.heading()) {
            Some(angle) => angle,
            None => return Some(last),
        };
        Some(project(last, angle, delta_distance as f32))
    }

    /// Extrapolated prey position at `at_us`.
    ///
    /// A turning prey bends its heading at `manu2` radians per 8 ms, scaled
    /// down; a prey that is not turning heads straight for its target.
    pub fn prey_position(&self, prey: &Prey, manu2: f32, at_us: u64) -> Coordinate {
        let delta_us = at_us.saturating_sub(prey.updated_us) as f32;
        let speed = (1000.0 * prey.speed / 32.0).min(self.prey_speed_cap);
        let dist = (speed * delta_us / US_PER_SECOND) as i32;

        let delta_angle = manu2 * delta_us / 1000.0 / 8.0 * 0.4;
        let angle = match prey.direction {
            RotationDirection::None => normalize_angle(prey.wangle),
            RotationDirection::CounterClockwise => normalize_angle(prey.angle) - delta_angle,
            RotationDirection::Clockwise => normalize_angle(prey.angle) + delta_angle,
        };
        project(prey.xy, normalize_angle(angle), dist as f32)
    }

    /// Move every live snake head to its extrapolated position.
    pub fn advance(&self, state: &mut GameState, at_us: u64) {
        let my_snake_id = state.my_snake_id;
        for snake in state.snakes.values_mut() {
            if let Some(head) = self.snake_head(snake, at_us) {
                if Some(snake.id) == my_snake_id {
                    trace!(
                        "own head {} after {} us",
                        head,
                        at_us.saturating_sub(snake.updated_us)
                    );
                }
                snake.head = head;
                snake.drawn_us = at_us;
            }
        }
    }

    /// Extrapolated positions of every prey that is not eaten.
    pub fn prey_positions(&self, state: &GameState, at_us: u64) -> Vec<(u16, Coordinate)> {
        state
            .preys
            .iter()
            .filter(|prey| !prey.eaten)
            .map(|prey| (prey.id, self.prey_position(prey, state.config.manu2, at_us)))
            .collect()
    }
}
