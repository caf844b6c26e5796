//! Integer screen geometry
//!
//! All coordinates are display pixels with Y=0 at the top of the display.

use serde::{Deserialize, Serialize};

/// Largest coordinate or size magnitude accepted from clients (pixels).
/// Edge arithmetic on rects within this range stays inside `i32`.
pub const MAX_COORDINATE: u32 = 1 << 16;

/// A point in display coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        self.x.unsigned_abs() <= MAX_COORDINATE && self.y.unsigned_abs() <= MAX_COORDINATE
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Origin and size all within `MAX_COORDINATE`
    pub fn in_bounds(&self) -> bool {
        Point::new(self.x, self.y).in_bounds() && self.width <= MAX_COORDINATE && self.height <= MAX_COORDINATE
    }

    /// Whether the rect is wider than it is tall (ties count as landscape)
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Smallest rect covering both. An empty rect is the identity.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    /// Move and shrink `self` so it lies within `bounds`.
    ///
    /// The size is reduced first, then the origin is pulled inside.
    pub fn clamp_into(&self, bounds: &Rect) -> Rect {
        let width = self.width.min(bounds.width);
        let height = self.height.min(bounds.height);
        let max_x = bounds.right() - width as i32;
        let max_y = bounds.bottom() - height as i32;
        Rect::new(
            self.x.clamp(bounds.x, max_x),
            self.y.clamp(bounds.y, max_y),
            width,
            height,
        )
    }
}
