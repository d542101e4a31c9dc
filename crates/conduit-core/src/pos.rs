//! Position addressing: worlds, block coordinates, sides.
//!
//! Every type here is an immutable value with a total order, so sets and
//! traversals over positions are deterministic regardless of insertion
//! order. [`BlockPos`] packs into an `i64` for the persisted cluster record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a world (dimension). Cheap to copy and compare.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WorldId(pub u32);

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// Field widths for the packed representation: x and z get 26 bits, y 12.
const X_BITS: u32 = 26;
const Y_BITS: u32 = 12;
const Z_BITS: u32 = 26;
const X_SHIFT: u32 = Y_BITS + Z_BITS;
const Y_SHIFT: u32 = Z_BITS;

/// An integer block coordinate.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Pack into a single `i64`: x in the top 26 bits, y in the middle 12,
    /// z in the low 26. This is the persisted form used by cluster records.
    pub fn packed(self) -> i64 {
        ((self.x as i64 & ((1 << X_BITS) - 1)) << X_SHIFT)
            | ((self.y as i64 & ((1 << Y_BITS) - 1)) << Y_SHIFT)
            | (self.z as i64 & ((1 << Z_BITS) - 1))
    }

    /// Inverse of [`packed`](BlockPos::packed). Arithmetic shifts restore
    /// the sign of each field.
    pub fn from_packed(packed: i64) -> Self {
        Self {
            x: (packed >> X_SHIFT) as i32,
            y: ((packed << (64 - X_BITS - Y_BITS)) >> (64 - Y_BITS)) as i32,
            z: ((packed << (64 - Z_BITS)) >> (64 - Z_BITS)) as i32,
        }
    }

    /// The neighboring coordinate on the given side.
    pub fn offset(self, side: Side) -> Self {
        let (dx, dy, dz) = side.direction();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Debug for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the six faces of a block position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Side {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Side {
    pub const ALL: [Side; 6] = [
        Side::Down,
        Side::Up,
        Side::North,
        Side::South,
        Side::West,
        Side::East,
    ];

    /// Stable lowercase name, used as the persisted side tag.
    pub fn name(self) -> &'static str {
        match self {
            Side::Down => "down",
            Side::Up => "up",
            Side::North => "north",
            Side::South => "south",
            Side::West => "west",
            Side::East => "east",
        }
    }

    /// Parse a persisted side tag. Returns `None` for unrecognized names.
    pub fn by_name(name: &str) -> Option<Side> {
        Side::ALL.into_iter().find(|side| side.name() == name)
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Down => Side::Up,
            Side::Up => Side::Down,
            Side::North => Side::South,
            Side::South => Side::North,
            Side::West => Side::East,
            Side::East => Side::West,
        }
    }

    /// Unit offset towards this side.
    pub fn direction(self) -> (i32, i32, i32) {
        match self {
            Side::Down => (0, -1, 0),
            Side::Up => (0, 1, 0),
            Side::North => (0, 0, -1),
            Side::South => (0, 0, 1),
            Side::West => (-1, 0, 0),
            Side::East => (1, 0, 0),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// DimPos / PartPos
// ---------------------------------------------------------------------------

/// A block coordinate in a specific world. Ordered by world, then coordinate.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DimPos {
    pub world: WorldId,
    pub pos: BlockPos,
}

impl DimPos {
    pub const fn new(world: WorldId, pos: BlockPos) -> Self {
        Self { world, pos }
    }

    pub fn offset(self, side: Side) -> Self {
        Self::new(self.world, self.pos.offset(side))
    }
}

impl fmt::Debug for DimPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in world {}", self.pos, self.world.0)
    }
}

impl fmt::Display for DimPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A position plus the side of it something is mounted on.
/// Ordered by position, then side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PartPos {
    pub pos: DimPos,
    pub side: Side,
}

impl PartPos {
    pub const fn new(pos: DimPos, side: Side) -> Self {
        Self { pos, side }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }

    #[test]
    fn packed_round_trip() {
        for p in [
            pos(0, 0, 0),
            pos(1, 2, 3),
            pos(-1, -2, -3),
            pos(30_000_000, 255, -30_000_000),
            pos(-30_000_000, -2048, 30_000_000),
        ] {
            assert_eq!(BlockPos::from_packed(p.packed()), p, "round trip of {p}");
        }
    }

    #[test]
    fn packed_is_injective_on_neighbors() {
        let origin = pos(0, 0, 0);
        let mut seen = BTreeSet::new();
        seen.insert(origin.packed());
        for side in Side::ALL {
            assert!(seen.insert(origin.offset(side).packed()));
        }
    }

    #[test]
    fn side_name_round_trip() {
        for side in Side::ALL {
            assert_eq!(Side::by_name(side.name()), Some(side));
        }
        assert_eq!(Side::by_name("upside"), None);
    }

    #[test]
    fn side_opposite_is_involution() {
        for side in Side::ALL {
            assert_eq!(side.opposite().opposite(), side);
        }
    }

    #[test]
    fn offset_and_back() {
        let p = pos(4, 5, 6);
        for side in Side::ALL {
            assert_eq!(p.offset(side).offset(side.opposite()), p);
        }
    }

    #[test]
    fn dim_pos_ordering_world_first() {
        let a = DimPos::new(WorldId(0), pos(100, 100, 100));
        let b = DimPos::new(WorldId(1), pos(-100, -100, -100));
        assert!(a < b);
    }

    #[test]
    fn part_pos_ordering_position_then_side() {
        let at = DimPos::new(WorldId(0), pos(0, 0, 0));
        let down = PartPos::new(at, Side::Down);
        let up = PartPos::new(at, Side::Up);
        assert!(down < up);
        let later = PartPos::new(DimPos::new(WorldId(0), pos(0, 0, 1)), Side::Down);
        assert!(up < later);
    }
}
