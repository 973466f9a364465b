//! Map Coordinates
//!
//! Integer 3D positions with subtile decomposition.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  MapCoord (i32)                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [ ... subtile number ... ][ position within subtile ]      │
//! │   └──── coord >> 8 ──────┘ └──── coord & 0xFF ─────┘        │
//! │                                                             │
//! │  1 subtile = 256 coord units                                │
//! │  1 slab    = 3 x 3 subtiles                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All movement math is integer. There are no floats anywhere in the
//! simulation, so every platform steps identically.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

/// Single map axis value in coord units.
pub type MapCoord = i32;

/// Coord units per subtile.
pub const COORD_PER_STL: MapCoord = 256;

/// Mask selecting the subtile-aligned part of a coordinate.
pub const STL_MASK: MapCoord = !0xFF;

/// Subtiles per slab edge.
pub const STL_PER_SLB: i32 = 3;

/// Subtile grid position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SubtileCoord {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl SubtileCoord {
    /// Create a subtile position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Center of this subtile at the given height.
    #[inline]
    pub const fn center(self, z: MapCoord) -> Coord3d {
        Coord3d {
            x: self.x * COORD_PER_STL + COORD_PER_STL / 2,
            y: self.y * COORD_PER_STL + COORD_PER_STL / 2,
            z,
        }
    }

    /// Slab containing this subtile.
    #[inline]
    pub const fn slab(self) -> (i32, i32) {
        (self.x.div_euclid(STL_PER_SLB), self.y.div_euclid(STL_PER_SLB))
    }

    /// Chebyshev distance in subtiles.
    #[inline]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// 3D position (or velocity) in coord units.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coord3d {
    /// X component
    pub x: MapCoord,
    /// Y component
    pub y: MapCoord,
    /// Z component (height)
    pub z: MapCoord,
}

impl Coord3d {
    /// Origin / zero velocity
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Create from components.
    #[inline]
    pub const fn new(x: MapCoord, y: MapCoord, z: MapCoord) -> Self {
        Self { x, y, z }
    }

    /// Subtile column.
    #[inline]
    pub const fn stl_x(self) -> i32 {
        stl_num(self.x)
    }

    /// Subtile row.
    #[inline]
    pub const fn stl_y(self) -> i32 {
        stl_num(self.y)
    }

    /// Subtile under this position.
    #[inline]
    pub const fn subtile(self) -> SubtileCoord {
        SubtileCoord::new(self.stl_x(), self.stl_y())
    }

    /// Same position with a different height.
    #[inline]
    pub const fn with_z(self, z: MapCoord) -> Self {
        Self { x: self.x, y: self.y, z }
    }

    /// Scale every component by `num / den` (truncating toward zero).
    #[inline]
    pub fn scale(self, num: i32, den: i32) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        Self {
            x: self.x * num / den,
            y: self.y * num / den,
            z: self.z * num / den,
        }
    }

    /// Squared planar distance (i64 to stay clear of overflow on big maps).
    #[inline]
    pub fn distance_xy_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Largest absolute planar component.
    #[inline]
    pub fn max_xy_abs(self) -> MapCoord {
        self.x.abs().max(self.y.abs())
    }

    /// Clamp each planar component into `[-limit, limit]`.
    #[inline]
    pub fn clamp_xy(self, limit: MapCoord) -> Self {
        let limit = limit.max(0);
        Self {
            x: self.x.clamp(-limit, limit),
            y: self.y.clamp(-limit, limit),
            z: self.z,
        }
    }
}

impl Add for Coord3d {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y), self.z.wrapping_add(rhs.z))
    }
}

impl Sub for Coord3d {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y), self.z.wrapping_sub(rhs.z))
    }
}

impl Neg for Coord3d {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Debug for Coord3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Coord3d({}:{}, {}:{}, {})",
            stl_num(self.x),
            stl_pos(self.x),
            stl_num(self.y),
            stl_pos(self.y),
            self.z
        )
    }
}

/// Subtile number of a coordinate.
#[inline]
pub const fn stl_num(coord: MapCoord) -> i32 {
    coord >> 8
}

/// Position inside its subtile (0..=255).
#[inline]
pub const fn stl_pos(coord: MapCoord) -> i32 {
    coord & 0xFF
}

/// Coordinate of the first unit of a subtile.
#[inline]
pub const fn stl_start(stl: i32) -> MapCoord {
    stl * COORD_PER_STL
}

// =============================================================================
// TESTS
// =============================================================================
