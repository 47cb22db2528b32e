use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::fmt;

/// A point in world units. Equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    ///Returns the point shifted by the given offsets.
    pub fn offset(&self, dx: i32, dy: i32) -> Coordinate {
        Coordinate {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

/// Axis-aligned rectangle given by its upper-left and lower-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub ul: Coordinate,
    pub lr: Coordinate,
}

impl Rect {
    pub const fn new(ul: Coordinate, lr: Coordinate) -> Self {
        Self { ul, lr }
    }

    pub fn width(&self) -> i32 {
        self.lr.x - self.ul.x
    }

    pub fn height(&self) -> i32 {
        self.lr.y - self.ul.y
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new((self.lr.x + self.ul.x) / 2, (self.lr.y + self.ul.y) / 2)
    }

    /// Inclusive on every edge. An inverted rectangle contains nothing.
    pub fn contains(&self, xy: Coordinate) -> bool {
        self.ul.x <= xy.x && self.ul.y <= xy.y && self.lr.x >= xy.x && self.lr.y >= xy.y
    }
}

///Returns the euclidean distance, truncated to whole world units.
pub fn distance(p1: Coordinate, p2: Coordinate) -> i32 {
    let dx = (p1.x as f32) - (p2.x as f32);
    let dy = (p1.y as f32) - (p2.y as f32);
    (dx * dx + dy * dy).sqrt() as i32
}

///Maps any angle into [0, 2π).
pub fn normalize_angle(angle: f32) -> f32 {
    let norm = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if norm >= TAU {
        0.0
    } else {
        norm
    }
}

/// Heading from `p1` towards `p2`, clockwise from the x axis in screen space.
pub fn angle_between(p1: Coordinate, p2: Coordinate) -> f32 {
    let dx = (p2.x - p1.x) as f32;
    let dy = (p2.y - p1.y) as f32;
    normalize_angle(dy.atan2(dx))
}

pub fn midpoint(p1: Coordinate, p2: Coordinate) -> Coordinate {
    Coordinate::new((p2.x + p1.x) / 2, (p2.y + p1.y) / 2)
}

/// Point `dist` units beyond `p2` on the line from `p1` through `p2`.
pub fn extrapolate(p1: Coordinate, p2: Coordinate, dist: i32) -> Coordinate {
    let span = distance(p1, p2);
    if span == 0 {
        return p2;
    }
    let ko = dist as f32 / span as f32;
    Coordinate::new(
        p2.x + ((p2.x - p1.x) as f32 * ko) as i32,
        p2.y + ((p2.y - p1.y) as f32 * ko) as i32,
    )
}

/// Point `dist` units from `p1` towards `p2`.
pub fn interpolate(p1: Coordinate, p2: Coordinate, dist: i32) -> Coordinate {
    let span = distance(p1, p2);
    if span == 0 {
        return p1;
    }
    let ko = dist as f32 / span as f32;
    Coordinate::new(
        p1.x + ((p2.x - p1.x) as f32 * ko) as i32,
        p1.y + ((p2.y - p1.y) as f32 * ko) as i32,
    )
}

/// Moves `from` by `dist` units along `angle`.
pub fn project(from: Coordinate, angle: f32, dist: f32) -> Coordinate {
    Coordinate::new(
        from.x + (angle.cos() * dist) as i32,
        from.y + (angle.sin() * dist) as i32,
    )
}

///Rotates a point around `center` by `angle` radians.
pub fn rotate(xy: Coordinate, center: Coordinate, angle: f32) -> Coordinate {
    let (sin, cos) = angle.sin_cos();
    let x = (xy.x - center.x) as f32;
    let y = (xy.y - center.y) as f32;
    Coordinate::new(
        (x * cos - y * sin) as i32 + center.x,
        (x * sin + y * cos) as i32 + center.y,
    )
}

/// Evenly spaced points on a circle, starting on the positive x axis.
pub fn circle_points(center: Coordinate, radius: i32, count: usize) -> Vec<Coordinate> {
    if count == 0 {
        return Vec::new();
    }
    let step = TAU / count as f32;
    (0..count)
        .map(|idx| project(center, normalize_angle(step * idx as f32), radius as f32))
        .collect()
}

pub fn octagon(center: Coordinate, radius: i32) -> [Coordinate; 8] {
    let mut points = [Coordinate::default(); 8];
    for (idx, point) in circle_points(center, radius, 8).into_iter().enumerate() {
        points[idx] = point;
    }
    points
}

/// Four axis tips joined through the midpoints between them.
pub fn octastar(center: Coordinate, radius: i32) -> [Coordinate; 8] {
    let Coordinate { x, y } = center;
    let mut points = [
        Coordinate::new(x + radius, y),
        Coordinate::default(),
        Coordinate::new(x, y + radius),
        Coordinate::default(),
        Coordinate::new(x - radius, y),
        Coordinate::default(),
        Coordinate::new(x, y - radius),
        Coordinate::default(),
    ];
    for idx in (1..8).step_by(2) {
        points[idx] = midpoint(points[idx - 1], points[(idx + 1) % 8]);
    }
    points
}

/// Appends one point per whole unit of distance from `p1` towards `p2`,
/// `p2` itself excluded.
pub fn line_segment_append(segment: &mut VecDeque<Coordinate>, p1: Coordinate, p2: Coordinate) {
    let dist = distance(p1, p2);
    segment.extend((0..dist).map(|step| interpolate(p1, p2, step)));
}

pub fn line_segment(p1: Coordinate, p2: Coordinate) -> VecDeque<Coordinate> {
    let mut segment = VecDeque::new();
    line_segment_append(&mut segment, p1, p2);
    segment
}

pub fn quad_bezier(p1: Coordinate, p2: Coordinate, p3: Coordinate, segments: usize) -> Vec<Coordinate> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|idx| {
            let t = idx as f32 / segments as f32;
            let a = (1.0 - t).powi(2);
            let b = 2.0 * t * (1.0 - t);
            let c = t.powi(2);
            Coordinate::new(
                (a * p1.x as f32 + b * p2.x as f32 + c * p3.x as f32) as i32,
                (a * p1.y as f32 + b * p2.y as f32 + c * p3.y as f32) as i32,
            )
        })
        .collect()
}

/// Smallest absolute difference between two angles, in [0, π].
pub fn angle_difference(a: f32, b: f32) -> f32 {
    let diff = normalize_angle(a - b);
    if diff > PI {
        TAU - diff
    } else {
        diff
    }
}
