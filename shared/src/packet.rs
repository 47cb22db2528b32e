//! Typed view of the game protocol.
//!
//! Every server frame is `[client_time: u16][type: u8][payload]`. All
//! multi-byte integers are big-endian; several fields are 24 bits wide.
//! [`Packet::decode`] is a pure function of the frame bytes, the client
//! applies the result to its world model separately.
//!
//! Some packet types (`e`, `y`, and the `j` extension) carry no sub-tag:
//! the payload length alone selects the layout. Two layouts of the same
//! length under one type cannot be told apart.

use crate::geometry::Coordinate;
use crate::wire::ByteReader;
use crate::{MINIMAP_SIDE, PROTOCOL_ID};
use std::f32::consts::TAU;
use std::fmt;
use thiserror::Error;

pub const HEADER_SIZE: usize = 3;
/// Size of the challenge frame, header included.
pub const CHALLENGE_FRAME_SIZE: usize = 165;
pub const HELLO: u8 = b'c';
pub const MAX_NICKNAME_LEN: usize = 24;

const FOOD_RECORD_SIZE: usize = 6;
const SNAKE_REMOVE_SIZE: usize = 3;
const SNAKE_DATA_HEADER_SIZE: usize = 22;
const PREY_UPDATE_BASE_SIZE: usize = 6;
const LEADERBOARD_HEADER_SIZE: usize = 5;
const FRACTION_24: f32 = 16_777_215.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Init,
    SnakeData,
    FamUpdate,
    Move,
    MoveRelative,
    MoveRelativeGrow,
    MoveGrow,
    RemovePart,
    RotateClockwise,
    Rotate,
    RotateWithSpeed,
    RotateAngle,
    SectorAdd,
    SectorRemove,
    FoodSet,
    FoodSpawn,
    FoodDrop,
    FoodEat,
    Prey,
    PreyUpdate,
    Minimap,
    Leaderboard,
    Pong,
    Death,
    Challenge,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let kind = match byte {
            b'a' => PacketType::Init,
            b's' => PacketType::SnakeData,
            b'h' => PacketType::FamUpdate,
            b'g' => PacketType::Move,
            b'G' => PacketType::MoveRelative,
            b'N' => PacketType::MoveRelativeGrow,
            b'n' => PacketType::MoveGrow,
            b'r' => PacketType::RemovePart,
            b'3' => PacketType::RotateClockwise,
            b'e' => PacketType::Rotate,
            b'4' => PacketType::RotateWithSpeed,
            b'5' => PacketType::RotateAngle,
            b'W' => PacketType::SectorAdd,
            b'w' => PacketType::SectorRemove,
            b'F' => PacketType::FoodSet,
            b'f' => PacketType::FoodSpawn,
            b'b' => PacketType::FoodDrop,
            b'c' => PacketType::FoodEat,
            b'y' => PacketType::Prey,
            b'j' => PacketType::PreyUpdate,
            b'u' => PacketType::Minimap,
            b'l' => PacketType::Leaderboard,
            b'p' => PacketType::Pong,
            b'v' => PacketType::Death,
            b'6' => PacketType::Challenge,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_byte(self) -> u8 {
        match self {
            PacketType::Init => b'a',
            PacketType::SnakeData => b's',
            PacketType::FamUpdate => b'h',
            PacketType::Move => b'g',
            PacketType::MoveRelative => b'G',
            PacketType::MoveRelativeGrow => b'N',
            PacketType::MoveGrow => b'n',
            PacketType::RemovePart => b'r',
            PacketType::RotateClockwise => b'3',
            PacketType::Rotate => b'e',
            PacketType::RotateWithSpeed => b'4',
            PacketType::RotateAngle => b'5',
            PacketType::SectorAdd => b'W',
            PacketType::SectorRemove => b'w',
            PacketType::FoodSet => b'F',
            PacketType::FoodSpawn => b'f',
            PacketType::FoodDrop => b'b',
            PacketType::FoodEat => b'c',
            PacketType::Prey => b'y',
            PacketType::PreyUpdate => b'j',
            PacketType::Minimap => b'u',
            PacketType::Leaderboard => b'l',
            PacketType::Pong => b'p',
            PacketType::Death => b'v',
            PacketType::Challenge => b'6',
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.as_byte() as char)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame of {0} bytes is shorter than the header")]
    FrameTooShort(usize),
    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),
    #[error("packet {packet} truncated: need {expected} bytes, got {actual}")]
    Truncated {
        packet: PacketType,
        expected: usize,
        actual: usize,
    },
    #[error("packet {packet} has unexpected payload size {size}")]
    UnexpectedSize { packet: PacketType, size: usize },
}

/// Turning state reported for snakes and prey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationDirection {
    #[default]
    None,
    CounterClockwise,
    Clockwise,
}

impl RotationDirection {
    /// Wire values are ASCII digits: `'0'` none, `'1'` ccw, `'2'` cw.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte.wrapping_sub(b'0') {
            0 => Some(RotationDirection::None),
            1 => Some(RotationDirection::CounterClockwise),
            2 => Some(RotationDirection::Clockwise),
            _ => None,
        }
    }
}

/// World parameters sent once after login.
#[derive(Debug, Clone, PartialEq)]
pub struct InitPacket {
    pub game_radius: i32,
    pub mscps: usize,
    pub sector_size: i32,
    pub sector_count_along_edge: u16,
    pub spangdv: f32,
    pub nsp1: f32,
    pub nsp2: f32,
    pub nsp3: f32,
    pub mamu: f32,
    pub manu2: f32,
    pub cst: f32,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodRecord {
    pub xy: Coordinate,
    pub color: u8,
    pub size: i32,
}

/// Fields a rotation packet carries; `None` leaves the current value alone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnakeRotation {
    pub angle: Option<f32>,
    pub wangle: Option<f32>,
    pub speed: Option<f32>,
    pub direction: Option<RotationDirection>,
}

/// Layouts of the `e` payload, selected by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateShape {
    Angle,
    AngleSpeed,
    AngleTargetSpeed,
}

impl RotateShape {
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            3 => Some(RotateShape::Angle),
            4 => Some(RotateShape::AngleSpeed),
            5 => Some(RotateShape::AngleTargetSpeed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnakeSnapshot {
    pub id: u16,
    pub angle: f32,
    pub wangle: f32,
    pub speed: f32,
    pub fam: f32,
    pub skin: u8,
    pub name: String,
    /// Tail first, authoritative head last.
    pub body: Vec<Coordinate>,
}

impl SnakeSnapshot {
    pub fn head(&self) -> Option<Coordinate> {
        self.body.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreyRecord {
    pub id: u16,
    pub xy: Coordinate,
    pub color: u8,
    pub size: i32,
    pub direction: RotationDirection,
    pub angle: f32,
    pub wangle: f32,
    pub speed: f32,
}

/// Optional trailer of a `j` packet, selected by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreyExtension {
    Bare,
    Speed,
    Angle,
    DirectionTarget,
    TargetSpeed,
    DirectionTargetSpeed,
    DirectionAngleTarget,
    Full,
}

impl PreyExtension {
    pub fn from_len(len: usize) -> Option<Self> {
        let shape = match len {
            0 => PreyExtension::Bare,
            2 => PreyExtension::Speed,
            3 => PreyExtension::Angle,
            4 => PreyExtension::DirectionTarget,
            5 => PreyExtension::TargetSpeed,
            6 => PreyExtension::DirectionTargetSpeed,
            7 => PreyExtension::DirectionAngleTarget,
            9 => PreyExtension::Full,
            _ => return None,
        };
        Some(shape)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub body_part_count: u16,
    pub font_color: u8,
    pub fam: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeaderboardPacket {
    pub rank_in_leaderboard: u8,
    pub rank: u16,
    pub player_count: u16,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Init(InitPacket),
    SectorAdd { x: u8, y: u8 },
    SectorRemove { x: u8, y: u8 },
    /// Records plus the count of trailing bytes that did not form one.
    FoodSet { foods: Vec<FoodRecord>, remainder: usize },
    FoodAdd(FoodRecord),
    FoodEat { xy: Coordinate, snake_id: u16 },
    Move { id: u16, xy: Coordinate },
    MoveRelative { id: u16, dx: i32, dy: i32 },
    MoveRelativeGrow { id: u16, dx: i32, dy: i32, fam: f32 },
    MoveGrow { id: u16, xy: Coordinate, fam: f32 },
    FamUpdate { id: u16, fam: f32 },
    RemovePart { id: u16, fam: f32 },
    Rotate { id: u16, rotation: SnakeRotation },
    SnakeRemove { id: u16, died: bool },
    SnakeData(SnakeSnapshot),
    PreyAdd(PreyRecord),
    PreyEat { id: u16, snake_id: u16 },
    PreyRemove { id: u16 },
    PreyUpdate { id: u16, xy: Coordinate, motion: SnakeRotation },
    /// Row-major occupancy, `MINIMAP_SIDE * MINIMAP_SIDE` cells.
    Minimap(Vec<bool>),
    Leaderboard(LeaderboardPacket),
    Pong,
    Death { reason: u8 },
    Challenge,
}

fn angle_8(value: u8) -> f32 {
    value as f32 * TAU / 256.0
}

fn angle_24(value: u32) -> f32 {
    value as f32 * TAU / FRACTION_24
}

fn fraction_24(value: u32) -> f32 {
    value as f32 / FRACTION_24
}

fn offset_128(value: u8) -> i32 {
    value as i32 - 128
}

/// Payload cursor that reports short reads as [`DecodeError::Truncated`].
struct Payload<'a> {
    reader: ByteReader<'a>,
    packet: PacketType,
    len: usize,
}

impl<'a> Payload<'a> {
    fn new(packet: PacketType, payload: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(payload),
            packet,
            len: payload.len(),
        }
    }

    fn truncated(&self, need: usize) -> DecodeError {
        DecodeError::Truncated {
            packet: self.packet,
            expected: self.reader.position() + need,
            actual: self.len,
        }
    }

    fn require(&self, min: usize) -> Result<(), DecodeError> {
        if self.len < min {
            return Err(DecodeError::Truncated {
                packet: self.packet,
                expected: min,
                actual: self.len,
            });
        }
        Ok(())
    }

    fn require_exact(&self, size: usize) -> Result<(), DecodeError> {
        if self.len != size {
            return Err(self.unexpected());
        }
        Ok(())
    }

    fn unexpected(&self) -> DecodeError {
        DecodeError::UnexpectedSize {
            packet: self.packet,
            size: self.len,
        }
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.reader.read_u8().ok_or_else(|| self.truncated(1))
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.reader.read_u16().ok_or_else(|| self.truncated(2))
    }

    fn u24(&mut self) -> Result<u32, DecodeError> {
        self.reader.read_u24().ok_or_else(|| self.truncated(3))
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.reader.read_bytes(len).ok_or_else(|| self.truncated(len))
    }

    fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    fn rest(&mut self) -> &'a [u8] {
        self.reader.rest()
    }

    fn xy16(&mut self) -> Result<Coordinate, DecodeError> {
        let x = self.u16()?;
        let y = self.u16()?;
        Ok(Coordinate::new(x as i32, y as i32))
    }

    /// 24-bit coordinate pair stored at five times world precision.
    fn xy24(&mut self) -> Result<Coordinate, DecodeError> {
        let x = self.u24()?;
        let y = self.u24()?;
        Ok(Coordinate::new((x / 5) as i32, (y / 5) as i32))
    }

    fn food(&mut self) -> Result<FoodRecord, DecodeError> {
        let color = self.u8()?;
        let xy = self.xy16()?;
        let size = self.u8()? as i32 / 5;
        Ok(FoodRecord { xy, color, size })
    }
}

impl Packet {
    pub fn decode(frame: &[u8]) -> Result<Packet, DecodeError> {
        if frame.len() < HEADER_SIZE {
            return Err(DecodeError::FrameTooShort(frame.len()));
        }
        let kind = PacketType::from_byte(frame[2]).ok_or(DecodeError::UnknownType(frame[2]))?;
        let mut p = Payload::new(kind, &frame[HEADER_SIZE..]);

        let packet = match kind {
            PacketType::Init => decode_init(&mut p)?,
            PacketType::SectorAdd | PacketType::SectorRemove => {
                p.require(2)?;
                let x = p.u8()?;
                let y = p.u8()?;
                if kind == PacketType::SectorAdd {
                    Packet::SectorAdd { x, y }
                } else {
                    Packet::SectorRemove { x, y }
                }
            }
            PacketType::FoodSet => {
                let count = p.len / FOOD_RECORD_SIZE;
                let remainder = p.len % FOOD_RECORD_SIZE;
                let mut foods = Vec::with_capacity(count);
                for _ in 0..count {
                    foods.push(p.food()?);
                }
                Packet::FoodSet { foods, remainder }
            }
            PacketType::FoodSpawn | PacketType::FoodDrop => {
                p.require(FOOD_RECORD_SIZE)?;
                Packet::FoodAdd(p.food()?)
            }
            PacketType::FoodEat => {
                p.require(6)?;
                let xy = p.xy16()?;
                let snake_id = p.u16()?;
                Packet::FoodEat { xy, snake_id }
            }
            PacketType::Move => {
                p.require(6)?;
                let id = p.u16()?;
                let xy = p.xy16()?;
                Packet::Move { id, xy }
            }
            PacketType::MoveRelative => {
                p.require(4)?;
                let id = p.u16()?;
                let dx = offset_128(p.u8()?);
                let dy = offset_128(p.u8()?);
                Packet::MoveRelative { id, dx, dy }
            }
            PacketType::MoveRelativeGrow => {
                p.require_exact(7)?;
                let id = p.u16()?;
                let dx = offset_128(p.u8()?);
                let dy = offset_128(p.u8()?);
                let fam = fraction_24(p.u24()?);
                Packet::MoveRelativeGrow { id, dx, dy, fam }
            }
            PacketType::MoveGrow => {
                p.require(9)?;
                let id = p.u16()?;
                let xy = p.xy16()?;
                let fam = fraction_24(p.u24()?);
                Packet::MoveGrow { id, xy, fam }
            }
            PacketType::FamUpdate | PacketType::RemovePart => {
                p.require(5)?;
                let id = p.u16()?;
                let fam = fraction_24(p.u24()?);
                if kind == PacketType::FamUpdate {
                    Packet::FamUpdate { id, fam }
                } else {
                    Packet::RemovePart { id, fam }
                }
            }
            PacketType::Rotate => decode_rotate(&mut p)?,
            PacketType::RotateClockwise => {
                p.require_exact(4)?;
                let id = p.u16()?;
                let rotation = SnakeRotation {
                    angle: Some(angle_8(p.u8()?)),
                    wangle: Some(angle_8(p.u8()?)),
                    speed: None,
                    direction: Some(RotationDirection::Clockwise),
                };
                Packet::Rotate { id, rotation }
            }
            PacketType::RotateWithSpeed => {
                p.require_exact(5)?;
                let id = p.u16()?;
                let rotation = SnakeRotation {
                    angle: Some(angle_8(p.u8()?)),
                    wangle: Some(angle_8(p.u8()?)),
                    speed: Some(p.u8()? as f32 / 18.0),
                    direction: None,
                };
                Packet::Rotate { id, rotation }
            }
            PacketType::RotateAngle => {
                // second byte is a target angle this variant does not apply
                p.require_exact(4)?;
                let id = p.u16()?;
                let rotation = SnakeRotation {
                    angle: Some(angle_8(p.u8()?)),
                    ..SnakeRotation::default()
                };
                Packet::Rotate { id, rotation }
            }
            PacketType::SnakeData => decode_snake(&mut p)?,
            PacketType::Prey => decode_prey(&mut p)?,
            PacketType::PreyUpdate => decode_prey_update(&mut p)?,
            PacketType::Minimap => Packet::Minimap(decode_minimap(p.rest())),
            PacketType::Leaderboard => decode_leaderboard(&mut p)?,
            PacketType::Pong => Packet::Pong,
            PacketType::Death => {
                p.require(1)?;
                Packet::Death { reason: p.u8()? }
            }
            PacketType::Challenge => Packet::Challenge,
        };
        Ok(packet)
    }
}

fn decode_init(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    p.require(23)?;
    Ok(Packet::Init(InitPacket {
        game_radius: p.u24()? as i32,
        mscps: p.u16()? as usize,
        sector_size: p.u16()? as i32,
        sector_count_along_edge: p.u16()?,
        spangdv: p.u8()? as f32 / 10.0,
        nsp1: p.u16()? as f32 / 100.0,
        nsp2: p.u16()? as f32 / 100.0,
        nsp3: p.u16()? as f32 / 100.0,
        mamu: p.u16()? as f32 / 1000.0,
        manu2: p.u16()? as f32 / 1000.0,
        cst: p.u16()? as f32 / 1000.0,
        protocol_version: p.u8()?,
    }))
}

fn decode_rotate(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    let shape = RotateShape::from_len(p.len).ok_or_else(|| p.unexpected())?;
    let id = p.u16()?;
    let angle = Some(angle_8(p.u8()?));
    let mut rotation = SnakeRotation {
        angle,
        ..SnakeRotation::default()
    };
    match shape {
        RotateShape::Angle => {}
        RotateShape::AngleSpeed => {
            rotation.speed = Some(p.u8()? as f32 / 18.0);
        }
        RotateShape::AngleTargetSpeed => {
            rotation.wangle = Some(angle_8(p.u8()?));
            rotation.speed = Some(p.u8()? as f32 / 18.0);
        }
    }
    Ok(Packet::Rotate { id, rotation })
}

fn decode_snake(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    if p.len == SNAKE_REMOVE_SIZE {
        let id = p.u16()?;
        let died = p.u8()? == 1;
        return Ok(Packet::SnakeRemove { id, died });
    }
    if p.len < SNAKE_DATA_HEADER_SIZE {
        return Err(p.unexpected());
    }

    let id = p.u16()?;
    let angle = angle_24(p.u24()?);
    let _unknown = p.u8()?;
    let wangle = angle_24(p.u24()?);
    let speed = p.u16()? as f32 / 1000.0;
    let fam = fraction_24(p.u24()?);
    let skin = p.u8()?;
    let head = p.xy24()?;
    let name_len = p.u8()? as usize;
    let name = String::from_utf8_lossy(p.bytes(name_len)?).into_owned();
    let skin_len = p.u8()? as usize;
    p.bytes(skin_len)?;
    let tail = p.xy24()?;

    let delta_count = p.remaining() / 2;
    let mut body = Vec::with_capacity(delta_count + 2);
    body.push(tail);
    let mut prev = tail;
    for _ in 0..delta_count {
        let dx = (p.u8()? as i32 - 127) / 2;
        let dy = (p.u8()? as i32 - 127) / 2;
        prev = prev.offset(dx, dy);
        body.push(prev);
    }
    body.push(head);

    Ok(Packet::SnakeData(SnakeSnapshot {
        id,
        angle,
        wangle,
        speed,
        fam,
        skin,
        name,
        body,
    }))
}

fn decode_prey(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    match p.len {
        2 => Ok(Packet::PreyRemove { id: p.u16()? }),
        4 => {
            let id = p.u16()?;
            let snake_id = p.u16()?;
            Ok(Packet::PreyEat { id, snake_id })
        }
        19 => {
            let id = p.u16()?;
            let color = p.u8()?;
            let xy = p.xy24()?;
            let size = p.u8()? as i32 / 5;
            let direction = RotationDirection::from_wire(p.u8()?).unwrap_or_default();
            let wangle = angle_24(p.u24()?);
            let angle = angle_24(p.u24()?);
            let speed = p.u16()? as f32 / 1000.0;
            Ok(Packet::PreyAdd(PreyRecord {
                id,
                xy,
                color,
                size,
                direction,
                angle,
                wangle,
                speed,
            }))
        }
        _ => Err(p.unexpected()),
    }
}

fn decode_prey_update(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    p.require(PREY_UPDATE_BASE_SIZE)?;
    let shape = PreyExtension::from_len(p.len - PREY_UPDATE_BASE_SIZE).ok_or_else(|| p.unexpected())?;
    let id = p.u16()?;
    let x = p.u16()? as i32 * 3 + 1;
    let y = p.u16()? as i32 * 3 + 1;

    let mut motion = SnakeRotation::default();
    let has_direction = matches!(
        shape,
        PreyExtension::DirectionTarget
            | PreyExtension::DirectionTargetSpeed
            | PreyExtension::DirectionAngleTarget
            | PreyExtension::Full
    );
    if has_direction {
        motion.direction = RotationDirection::from_wire(p.u8()?);
    }
    if matches!(
        shape,
        PreyExtension::Angle | PreyExtension::DirectionAngleTarget | PreyExtension::Full
    ) {
        motion.angle = Some(angle_24(p.u24()?));
    }
    if !matches!(shape, PreyExtension::Bare | PreyExtension::Speed | PreyExtension::Angle) {
        motion.wangle = Some(angle_24(p.u24()?));
    }
    if matches!(
        shape,
        PreyExtension::Speed
            | PreyExtension::TargetSpeed
            | PreyExtension::DirectionTargetSpeed
            | PreyExtension::Full
    ) {
        motion.speed = Some(p.u16()? as f32 / 1000.0);
    }

    Ok(Packet::PreyUpdate {
        id,
        xy: Coordinate::new(x, y),
        motion,
    })
}

fn decode_leaderboard(p: &mut Payload<'_>) -> Result<Packet, DecodeError> {
    p.require(LEADERBOARD_HEADER_SIZE)?;
    let mut board = LeaderboardPacket {
        rank_in_leaderboard: p.u8()?,
        rank: p.u16()?,
        player_count: p.u16()?,
        entries: Vec::new(),
    };
    while p.remaining() > 0 && board.entries.len() < crate::LEADERBOARD_SIZE {
        match decode_leaderboard_entry(p) {
            Ok(entry) => board.entries.push(entry),
            Err(_) => break,
        }
    }
    Ok(Packet::Leaderboard(board))
}

fn decode_leaderboard_entry(p: &mut Payload<'_>) -> Result<LeaderboardEntry, DecodeError> {
    let body_part_count = p.u16()?;
    let fam = fraction_24(p.u24()?);
    let font_color = p.u8()?;
    let name_len = p.u8()? as usize;
    let name = String::from_utf8_lossy(p.bytes(name_len)?).into_owned();
    Ok(LeaderboardEntry {
        name,
        body_part_count,
        font_color,
        fam,
    })
}

/// Decode the minimap bitmap.
///
/// A byte of 128 or more skips `value - 128` cells; any other byte holds
/// seven cells, bit 6 first. Decoding stops once the cursor leaves the grid.
pub fn decode_minimap(data: &[u8]) -> Vec<bool> {
    let size = MINIMAP_SIDE * MINIMAP_SIDE;
    let mut cells = vec![false; size];
    let mut pos = 0usize;
    for &value in data {
        if pos >= size {
            break;
        }
        if value >= 128 {
            pos += (value - 128) as usize;
            continue;
        }
        for bit in (0..7).rev() {
            if pos >= size {
                break;
            }
            if value & (1 << bit) != 0 {
                cells[pos] = true;
            }
            pos += 1;
        }
    }
    cells
}

/// Inverse of [`decode_minimap`]; runs of seven or more empty cells become
/// skip bytes.
pub fn encode_minimap(cells: &[bool]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < cells.len() {
        let empty_run = cells[pos..].iter().take(127).take_while(|cell| !**cell).count();
        if empty_run >= 7 {
            out.push(128 + empty_run as u8);
            pos += empty_run;
            continue;
        }
        let mut packed = 0u8;
        for bit in 0..7 {
            if cells.get(pos + bit).copied().unwrap_or(false) {
                packed |= 1 << (6 - bit);
            }
        }
        out.push(packed);
        pos += 7;
    }
    out
}

/// Prepend the frame header to a payload.
pub fn encode_frame(client_time: u16, kind: PacketType, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&client_time.to_be_bytes());
    frame.push(kind.as_byte());
    frame.extend_from_slice(payload);
    frame
}

/// Single-message controls sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Heading in 1/251 turns, 0..=250.
    Heading(u8),
    /// 0-127 left turns, 128-255 right turns, in 8 ms frames.
    Turn(u8),
    Accelerate(bool),
    Ping,
}

impl ControlMessage {
    pub const PING: u8 = 251;
    pub const TURN: u8 = 252;
    pub const ACCELERATE_ON: u8 = 253;
    pub const ACCELERATE_OFF: u8 = 254;

    /// Heading control for an angle in radians, clockwise from +x.
    pub fn heading(angle: f32) -> Self {
        let value = (angle * 251.0 / TAU) as i32;
        ControlMessage::Heading(value.clamp(0, 250) as u8)
    }

    pub fn encode(&self) -> Vec<u8> {
        match *self {
            ControlMessage::Heading(value) => vec![value.min(250)],
            ControlMessage::Turn(count) => vec![Self::TURN, count],
            ControlMessage::Accelerate(true) => vec![Self::ACCELERATE_ON],
            ControlMessage::Accelerate(false) => vec![Self::ACCELERATE_OFF],
            ControlMessage::Ping => vec![Self::PING],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub skin: u8,
    pub nickname: String,
}

impl LoginRequest {
    pub fn new(skin: u8, nickname: &str) -> Self {
        Self {
            skin,
            nickname: nickname.to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let nickname = self.nickname.as_bytes();
        let nickname = &nickname[..nickname.len().min(MAX_NICKNAME_LEN)];
        let mut buf = Vec::with_capacity(4 + nickname.len());
        buf.push(b's');
        buf.push(PROTOCOL_ID);
        buf.push(self.skin);
        buf.push(nickname.len() as u8);
        buf.extend_from_slice(nickname);
        buf
    }

    /// Parse a login frame as sent by [`LoginRequest::encode`].
    pub fn decode(frame: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(frame);
        if reader.read_u8()? != b's' {
            return None;
        }
        let _protocol = reader.read_u8()?;
        let skin = reader.read_u8()?;
        let len = reader.read_u8()? as usize;
        let nickname = reader.read_bytes(len)?;
        Some(Self {
            skin,
            nickname: String::from_utf8_lossy(nickname).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn frame(kind: PacketType, payload: &[u8]) -> Vec<u8> {
        encode_frame(0, kind, payload)
    }

    fn u24(value: u32) -> [u8; 3] {
        [(value >> 16) as u8, (value >> 8) as u8, value as u8]
    }

    #[test]
    fn test_packet_type_round_trip_bytes() {
        for byte in 0..=255u8 {
            if let Some(kind) = PacketType::from_byte(byte) {
                assert_eq!(kind.as_byte(), byte);
            }
        }
        assert_eq!(PacketType::from_byte(b'Z'), None);
    }

    #[test]
    fn test_short_and_unknown_frames() {
        assert_eq!(Packet::decode(&[0, 0]), Err(DecodeError::FrameTooShort(2)));
        assert_eq!(Packet::decode(&[0, 0, b'Z']), Err(DecodeError::UnknownType(b'Z')));
    }

    #[test]
    fn test_decode_init() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&u24(21600));
        payload.extend_from_slice(&411u16.to_be_bytes());
        payload.extend_from_slice(&300u16.to_be_bytes());
        payload.extend_from_slice(&144u16.to_be_bytes());
        payload.push(48);
        payload.extend_from_slice(&539u16.to_be_bytes());
        payload.extend_from_slice(&40u16.to_be_bytes());
        payload.extend_from_slice(&1400u16.to_be_bytes());
        payload.extend_from_slice(&33u16.to_be_bytes());
        payload.extend_from_slice(&28u16.to_be_bytes());
        payload.extend_from_slice(&430u16.to_be_bytes());
        payload.push(11);

        match Packet::decode(&frame(PacketType::Init, &payload)).unwrap() {
            Packet::Init(init) => {
                assert_eq!(init.game_radius, 21600);
                assert_eq!(init.mscps, 411);
                assert_eq!(init.sector_size, 300);
                assert_approx_eq!(init.spangdv, 4.8, 1e-6);
                assert_approx_eq!(init.nsp1, 5.39, 1e-6);
                assert_approx_eq!(init.manu2, 0.028, 1e-6);
                assert_approx_eq!(init.cst, 0.43, 1e-6);
                assert_eq!(init.protocol_version, 11);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        let err = Packet::decode(&frame(PacketType::Init, &payload[..10])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                packet: PacketType::Init,
                expected: 23,
                actual: 10
            }
        );
    }

    #[test]
    fn test_food_set_reports_remainder() {
        let payload = [1, 0, 10, 0, 20, 25, 2, 0, 30, 0, 40, 50, 9, 9];
        match Packet::decode(&frame(PacketType::FoodSet, &payload)).unwrap() {
            Packet::FoodSet { foods, remainder } => {
                assert_eq!(foods.len(), 2);
                assert_eq!(remainder, 2);
                assert_eq!(foods[0].xy, Coordinate::new(10, 20));
                assert_eq!(foods[0].size, 5);
                assert_eq!(foods[1].color, 2);
                assert_eq!(foods[1].size, 10);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_relative_move_offsets() {
        let packet = Packet::decode(&frame(PacketType::MoveRelative, &[0, 7, 130, 120])).unwrap();
        assert_eq!(packet, Packet::MoveRelative { id: 7, dx: 2, dy: -8 });
    }

    #[test]
    fn test_relative_grow_requires_exact_size() {
        let mut payload = vec![0, 7, 128, 129];
        payload.extend_from_slice(&u24(16_777_215));
        match Packet::decode(&frame(PacketType::MoveRelativeGrow, &payload)).unwrap() {
            Packet::MoveRelativeGrow { id, dx, dy, fam } => {
                assert_eq!((id, dx, dy), (7, 0, 1));
                assert_approx_eq!(fam, 1.0, 1e-6);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        payload.push(0);
        let err = Packet::decode(&frame(PacketType::MoveRelativeGrow, &payload)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedSize {
                packet: PacketType::MoveRelativeGrow,
                size: 8
            }
        );
    }

    #[test]
    fn test_rotate_shapes_by_length() {
        let rotation = |payload: &[u8]| match Packet::decode(&frame(PacketType::Rotate, payload)) {
            Ok(Packet::Rotate { rotation, .. }) => rotation,
            other => panic!("unexpected {:?}", other),
        };

        let r = rotation(&[0, 1, 64]);
        assert_approx_eq!(r.angle.unwrap(), TAU / 4.0, 1e-6);
        assert_eq!(r.wangle, None);
        assert_eq!(r.speed, None);

        let r = rotation(&[0, 1, 64, 36]);
        assert_approx_eq!(r.speed.unwrap(), 2.0, 1e-6);
        assert_eq!(r.wangle, None);

        let r = rotation(&[0, 1, 64, 128, 18]);
        assert_approx_eq!(r.wangle.unwrap(), TAU / 2.0, 1e-6);
        assert_approx_eq!(r.speed.unwrap(), 1.0, 1e-6);

        assert!(matches!(
            Packet::decode(&frame(PacketType::Rotate, &[0, 1])),
            Err(DecodeError::UnexpectedSize { size: 2, .. })
        ));
    }

    #[test]
    fn test_rotate_clockwise_sets_direction() {
        match Packet::decode(&frame(PacketType::RotateClockwise, &[0, 1, 0, 64])).unwrap() {
            Packet::Rotate { rotation, .. } => {
                assert_eq!(rotation.direction, Some(RotationDirection::Clockwise));
                assert_approx_eq!(rotation.wangle.unwrap(), TAU / 4.0, 1e-6);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        match Packet::decode(&frame(PacketType::RotateAngle, &[0, 1, 64, 200])).unwrap() {
            Packet::Rotate { rotation, .. } => {
                assert!(rotation.angle.is_some());
                assert_eq!(rotation.wangle, None);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    fn snake_payload(name: &str, tail: (u32, u32), deltas: &[(u8, u8)], head: (u32, u32)) -> Vec<u8> {
        let mut payload = vec![0, 42];
        payload.extend_from_slice(&u24(0));
        payload.push(0);
        payload.extend_from_slice(&u24(0));
        payload.extend_from_slice(&5000u16.to_be_bytes());
        payload.extend_from_slice(&u24(8_388_607));
        payload.push(9);
        payload.extend_from_slice(&u24(head.0 * 5));
        payload.extend_from_slice(&u24(head.1 * 5));
        payload.push(name.len() as u8);
        payload.extend_from_slice(name.as_bytes());
        payload.push(2);
        payload.extend_from_slice(&[7, 7]);
        payload.extend_from_slice(&u24(tail.0 * 5));
        payload.extend_from_slice(&u24(tail.1 * 5));
        for &(dx, dy) in deltas {
            payload.push(dx);
            payload.push(dy);
        }
        payload
    }

    #[test]
    fn test_snake_snapshot_chains_from_tail() {
        let payload = snake_payload("bob", (100, 100), &[(147, 127), (147, 107)], (130, 100));
        match Packet::decode(&frame(PacketType::SnakeData, &payload)).unwrap() {
            Packet::SnakeData(snake) => {
                assert_eq!(snake.id, 42);
                assert_eq!(snake.name, "bob");
                assert_eq!(snake.skin, 9);
                assert_approx_eq!(snake.speed, 5.0, 1e-6);
                assert_approx_eq!(snake.fam, 0.5, 1e-3);
                assert_eq!(
                    snake.body,
                    vec![
                        Coordinate::new(100, 100),
                        Coordinate::new(110, 100),
                        Coordinate::new(120, 90),
                        Coordinate::new(130, 100),
                    ]
                );
                assert_eq!(snake.head(), Some(Coordinate::new(130, 100)));
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_snake_snapshot_truncated_name() {
        let mut payload = snake_payload("abc", (1, 1), &[], (2, 2));
        payload.truncate(SNAKE_DATA_HEADER_SIZE + 1);
        assert!(matches!(
            Packet::decode(&frame(PacketType::SnakeData, &payload)),
            Err(DecodeError::Truncated { packet: PacketType::SnakeData, .. })
        ));
    }

    #[test]
    fn test_snake_remove() {
        let packet = Packet::decode(&frame(PacketType::SnakeData, &[0, 9, 1])).unwrap();
        assert_eq!(packet, Packet::SnakeRemove { id: 9, died: true });
        let packet = Packet::decode(&frame(PacketType::SnakeData, &[0, 9, 0])).unwrap();
        assert_eq!(packet, Packet::SnakeRemove { id: 9, died: false });
    }

    #[test]
    fn test_prey_by_size() {
        assert_eq!(
            Packet::decode(&frame(PacketType::Prey, &[0, 3])).unwrap(),
            Packet::PreyRemove { id: 3 }
        );
        assert_eq!(
            Packet::decode(&frame(PacketType::Prey, &[0, 3, 0, 8])).unwrap(),
            Packet::PreyEat { id: 3, snake_id: 8 }
        );

        let mut payload = vec![0, 3, 4];
        payload.extend_from_slice(&u24(500));
        payload.extend_from_slice(&u24(1000));
        payload.push(50);
        payload.push(b'2');
        payload.extend_from_slice(&u24(0));
        payload.extend_from_slice(&u24(0));
        payload.extend_from_slice(&1500u16.to_be_bytes());
        match Packet::decode(&frame(PacketType::Prey, &payload)).unwrap() {
            Packet::PreyAdd(prey) => {
                assert_eq!(prey.xy, Coordinate::new(100, 200));
                assert_eq!(prey.size, 10);
                assert_eq!(prey.direction, RotationDirection::Clockwise);
                assert_approx_eq!(prey.speed, 1.5, 1e-6);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_prey_update_extensions() {
        let decode = |ext: &[u8]| {
            let mut payload = vec![0, 1, 0, 10, 0, 20];
            payload.extend_from_slice(ext);
            Packet::decode(&frame(PacketType::PreyUpdate, &payload))
        };

        match decode(&[]).unwrap() {
            Packet::PreyUpdate { xy, motion, .. } => {
                assert_eq!(xy, Coordinate::new(31, 61));
                assert_eq!(motion, SnakeRotation::default());
            }
            other => panic!("unexpected packet {:?}", other),
        }

        match decode(&[b'1', 0x80, 0, 0]).unwrap() {
            Packet::PreyUpdate { motion, .. } => {
                assert_eq!(motion.direction, Some(RotationDirection::CounterClockwise));
                assert!(motion.wangle.is_some());
                assert_eq!(motion.angle, None);
                assert_eq!(motion.speed, None);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        match decode(&[b'0', 0, 0, 0, 0x80, 0, 0, 0x03, 0xe8]).unwrap() {
            Packet::PreyUpdate { motion, .. } => {
                assert_eq!(motion.direction, Some(RotationDirection::None));
                assert_approx_eq!(motion.angle.unwrap(), 0.0, 1e-6);
                assert_approx_eq!(motion.wangle.unwrap(), TAU / 2.0, 1e-3);
                assert_approx_eq!(motion.speed.unwrap(), 1.0, 1e-6);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        assert!(matches!(decode(&[0]), Err(DecodeError::UnexpectedSize { size: 7, .. })));
    }

    #[test]
    fn test_minimap_skip_and_bits() {
        let cells = decode_minimap(&[0b100_0001, 128 + 3, 0b000_0001]);
        assert!(cells[0]);
        assert!(cells[6]);
        assert!(!cells[1]);
        assert!(cells[16]);
        assert_eq!(cells.iter().filter(|c| **c).count(), 3);
    }

    #[test]
    fn test_minimap_stops_at_grid_end() {
        let mut data = vec![255u8; 60];
        data.push(0x7f);
        let cells = decode_minimap(&data);
        assert_eq!(cells.len(), MINIMAP_SIDE * MINIMAP_SIDE);
        assert!(cells.iter().all(|c| !*c));
    }

    #[test]
    fn test_minimap_encode_decode_random_patterns() {
        let mut rng = StdRng::seed_from_u64(7);
        for density in [0.0, 0.02, 0.3, 0.9] {
            let cells: Vec<bool> = (0..MINIMAP_SIDE * MINIMAP_SIDE)
                .map(|_| rng.gen_bool(density))
                .collect();
            let decoded = decode_minimap(&encode_minimap(&cells));
            assert_eq!(decoded, cells, "density {}", density);
        }
    }

    #[test]
    fn test_leaderboard_stops_on_truncated_record() {
        let mut payload = vec![3, 0, 5, 0, 120];
        payload.extend_from_slice(&[0, 50]);
        payload.extend_from_slice(&u24(0));
        payload.extend_from_slice(&[4, 3]);
        payload.extend_from_slice(b"ann");
        payload.extend_from_slice(&[0, 60, 0]);

        match Packet::decode(&frame(PacketType::Leaderboard, &payload)).unwrap() {
            Packet::Leaderboard(board) => {
                assert_eq!(board.rank_in_leaderboard, 3);
                assert_eq!(board.rank, 5);
                assert_eq!(board.player_count, 120);
                assert_eq!(board.entries.len(), 1);
                assert_eq!(board.entries[0].name, "ann");
                assert_eq!(board.entries[0].body_part_count, 50);
                assert_eq!(board.entries[0].font_color, 4);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_control_messages() {
        assert_eq!(ControlMessage::Ping.encode(), vec![251]);
        assert_eq!(ControlMessage::Accelerate(true).encode(), vec![253]);
        assert_eq!(ControlMessage::Accelerate(false).encode(), vec![254]);
        assert_eq!(ControlMessage::Turn(130).encode(), vec![252, 130]);
        assert_eq!(ControlMessage::heading(0.0), ControlMessage::Heading(0));
        assert_eq!(ControlMessage::heading(TAU / 2.0), ControlMessage::Heading(125));
        assert_eq!(ControlMessage::heading(TAU - 1e-4), ControlMessage::Heading(250));
    }

    #[test]
    fn test_login_truncates_nickname() {
        let login = LoginRequest::new(5, "a-very-long-nickname-that-overflows");
        let bytes = login.encode();
        assert_eq!(&bytes[..4], &[b's', PROTOCOL_ID, 5, MAX_NICKNAME_LEN as u8]);
        assert_eq!(bytes.len(), 4 + MAX_NICKNAME_LEN);
    }

    #[test]
    fn test_login_decode() {
        let bytes = LoginRequest::new(9, "slim").encode();
        assert_eq!(LoginRequest::decode(&bytes), Some(LoginRequest::new(9, "slim")));
        assert_eq!(LoginRequest::decode(&bytes[..bytes.len() - 1]), None);
        assert_eq!(LoginRequest::decode(&[b'c']), None);
    }
}
