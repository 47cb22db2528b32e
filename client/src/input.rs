//! Pointer sampling and the outgoing control schedule

use crate::game::GameState;
use crate::view::ViewMapper;
use log::debug;
use shared::geometry::{angle_between, project};
use shared::packet::ControlMessage;
use shared::{Coordinate, HEADING_REFRESH_PERIOD, PING_PERIOD, SEND_PERIOD_MIN};
use std::f32::consts::{PI, TAU};

/// Heading changes smaller than this are not worth a control byte.
const HEADING_TOLERANCE: f32 = PI / 360.0;

/// One reading of the player's controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    /// Pointer position in screen coordinates.
    pub pointer: Coordinate,
    pub accelerate: bool,
    /// Discrete turn request in 8 ms frames, 0-127 left, 128-255 right.
    pub turn: Option<u8>,
}

/// Anything that can report the player's controls.
pub trait InputSource {
    fn sample(&mut self, now_us: u64) -> InputSample;
}

/// Headless input that sweeps the pointer in a circle around the screen
/// center, so the own snake keeps turning without a window.
#[derive(Debug, Clone)]
pub struct AutopilotInput {
    mapper: ViewMapper,
    period_us: u64,
}

impl AutopilotInput {
    pub fn new(mapper: ViewMapper, period_us: u64) -> Self {
        Self {
            mapper,
            period_us: period_us.max(1),
        }
    }
}

impl InputSource for AutopilotInput {
    fn sample(&mut self, now_us: u64) -> InputSample {
        let phase = (now_us % self.period_us) as f32 / self.period_us as f32;
        let radius = (self.mapper.width.min(self.mapper.height) / 4) as f32;
        InputSample {
            pointer: project(self.mapper.screen_center(), phase * TAU, radius),
            accelerate: false,
            turn: None,
        }
    }
}

/// Decides which control bytes go out on each send tick.
#[derive(Debug, Clone, Default)]
pub struct ControlSender {
    last_angle: f32,
    last_accelerate: Option<bool>,
    heading_sent_us: u64,
    last_send_us: Option<u64>,
}

impl ControlSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the controls due at `now_us`.
    ///
    /// Pings go out every [`PING_PERIOD`] while none is outstanding. Heading
    /// and acceleration are rate limited to one batch per
    /// [`SEND_PERIOD_MIN`]; the heading is sent when it moved past a small
    /// tolerance or [`HEADING_REFRESH_PERIOD`] elapsed, acceleration only
    /// when it changed.
    pub fn poll(
        &mut self,
        state: &mut GameState,
        mapper: &ViewMapper,
        input: &InputSample,
        now_us: u64,
    ) -> Vec<ControlMessage> {
        let mut messages = Vec::new();
        if !state.ready() {
            return messages;
        }

        let ping_due = now_us.saturating_sub(state.ping.sent_us) >= PING_PERIOD.as_micros() as u64;
        if ping_due && !state.ping.awaiting_pong {
            state.ping.start(now_us);
            messages.push(ControlMessage::Ping);
        }

        if !state.view.ready() {
            return messages;
        }
        if let Some(last) = self.last_send_us {
            if now_us.saturating_sub(last) < SEND_PERIOD_MIN.as_micros() as u64 {
                return messages;
            }
        }

        let head = match state.my_snake() {
            Some(snake) => snake.head,
            None => return messages,
        };
        let angle = angle_between(head, mapper.to_world(&state.view, input.pointer));
        let refresh_due =
            now_us.saturating_sub(self.heading_sent_us) >= HEADING_REFRESH_PERIOD.as_micros() as u64;
        if (angle - self.last_angle).abs() > HEADING_TOLERANCE || refresh_due {
            let heading = ControlMessage::heading(angle);
            debug!("heading {:.3} rad as {:?}", angle, heading);
            messages.push(heading);
            self.last_angle = angle;
            self.heading_sent_us = now_us;
        }

        if self.last_accelerate != Some(input.accelerate) {
            messages.push(ControlMessage::Accelerate(input.accelerate));
            self.last_accelerate = Some(input.accelerate);
        }

        if let Some(turn) = input.turn {
            messages.push(ControlMessage::Turn(turn));
        }

        self.last_send_us = Some(now_us);
        messages
    }
}
