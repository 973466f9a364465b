//! Dungeon Block Grid
//!
//! One block per subtile. Slabs are 3x3 subtile squares and carry the
//! terrain kind; physics reads heights and solidity, cast checks read the
//! terrain category and ownership.
//!
//! ```text
//!   slab (1,0)
//!   ┌───┬───┬───┐
//!   │3,0│4,0│5,0│   subtile = 256 coord units
//!   ├───┼───┼───┤   slab    = 3 subtiles
//!   │3,1│4,1│5,1│
//!   ├───┼───┼───┤
//!   │3,2│4,2│5,2│
//!   └───┴───┴───┘
//! ```

use serde::{Serialize, Deserialize};
use bitflags::bitflags;

use crate::core::coord::{MapCoord, SubtileCoord, COORD_PER_STL, STL_PER_SLB};
use crate::game::player::PlayerId;

/// Ceiling height of open ground.
pub const DEFAULT_CEILING: MapCoord = 8 * COORD_PER_STL;

/// Floor height of open ground.
pub const DEFAULT_FLOOR: MapCoord = 0;

bitflags! {
    /// Per-subtile geometry flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MapFlags: u8 {
        /// Blocks movement entirely
        const SOLID         = 0x01;
        /// Door; blocks movement and is reported to combat logic
        const DOOR          = 0x02;
        /// Water or lava
        const LIQUID        = 0x04;
        /// Revealed by a temporary effect
        const REVEALED_TEMP = 0x08;
    }
}

/// Terrain kind of a slab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SlabKind {
    /// Impenetrable rock
    Rock = 0,
    /// Gold seam
    Gold = 1,
    /// Diggable earth
    Earth = 2,
    /// Fortified wall
    Wall = 3,
    /// Unclaimed path
    Path = 4,
    /// Claimed floor
    Claimed = 5,
    /// Room floor
    Room = 6,
    /// Water
    Water = 7,
    /// Lava
    Lava = 8,
    /// Door frame
    Door = 9,
}

impl SlabKind {
    /// Slab occupies the full height.
    pub fn is_tall(self) -> bool {
        matches!(self, SlabKind::Rock | SlabKind::Gold | SlabKind::Earth | SlabKind::Wall | SlabKind::Door)
    }

    /// Slab is walkable ground.
    pub fn is_ground(self) -> bool {
        !self.is_tall()
    }

    /// Ground that can be claimed.
    pub fn is_claimable_ground(self) -> bool {
        matches!(self, SlabKind::Path | SlabKind::Claimed)
    }

    /// Tall slab that can be fortified.
    pub fn is_claimable_tall(self) -> bool {
        matches!(self, SlabKind::Earth | SlabKind::Wall)
    }

    /// Diggers can remove it.
    pub fn is_diggable(self) -> bool {
        matches!(self, SlabKind::Earth | SlabKind::Gold)
    }

    fn block_flags(self) -> MapFlags {
        match self {
            SlabKind::Rock | SlabKind::Gold | SlabKind::Earth | SlabKind::Wall => MapFlags::SOLID,
            SlabKind::Door => MapFlags::DOOR,
            SlabKind::Water | SlabKind::Lava => MapFlags::LIQUID,
            _ => MapFlags::empty(),
        }
    }
}

/// One subtile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBlock {
    /// Geometry flags
    pub flags: MapFlags,
    /// Terrain of the containing slab
    pub slab: SlabKind,
    /// Owning player, if claimed
    pub owner: Option<PlayerId>,
    /// Floor height
    pub floor: MapCoord,
    /// Ceiling height
    pub ceiling: MapCoord,
    /// Players that have revealed it (bit per player id)
    pub revealed: u8,
}

impl MapBlock {
    /// Fresh block of a slab kind.
    pub fn new(slab: SlabKind, owner: Option<PlayerId>) -> Self {
        let mut block = Self {
            flags: MapFlags::empty(),
            slab,
            owner,
            floor: DEFAULT_FLOOR,
            ceiling: DEFAULT_CEILING,
            revealed: 0,
        };
        block.set_slab(slab, owner);
        block
    }

    /// Change terrain, keeping reveal state.
    pub fn set_slab(&mut self, slab: SlabKind, owner: Option<PlayerId>) {
        let temp = self.flags & MapFlags::REVEALED_TEMP;
        self.slab = slab;
        self.owner = owner;
        self.flags = slab.block_flags() | temp;
        if slab.is_tall() {
            self.floor = DEFAULT_CEILING;
        } else if self.floor >= self.ceiling {
            self.floor = DEFAULT_FLOOR;
        }
    }

    /// Movement cannot enter this block at any height.
    pub fn blocks_movement(&self) -> bool {
        self.flags.intersects(MapFlags::SOLID | MapFlags::DOOR)
    }

    /// Revealed for a player.
    pub fn is_revealed(&self, player: PlayerId) -> bool {
        player.reveal_bit().map(|bit| self.revealed & bit != 0).unwrap_or(false)
    }
}

/// Subtile grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGrid {
    width: i32,
    height: i32,
    blocks: Vec<MapBlock>,
}

impl MapGrid {
    /// Grid of `width_slabs` x `height_slabs` slabs, all of one kind.
    pub fn new(width_slabs: i32, height_slabs: i32, fill: SlabKind) -> Self {
        let width = width_slabs.max(1) * STL_PER_SLB;
        let height = height_slabs.max(1) * STL_PER_SLB;
        Self {
            width,
            height,
            blocks: vec![MapBlock::new(fill, None); (width * height) as usize],
        }
    }

    /// Width in subtiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in subtiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Largest valid X coordinate.
    pub fn max_coord_x(&self) -> MapCoord {
        self.width * COORD_PER_STL - 1
    }

    /// Largest valid Y coordinate.
    pub fn max_coord_y(&self) -> MapCoord {
        self.height * COORD_PER_STL - 1
    }

    /// True if the subtile lies on the grid.
    pub fn in_bounds(&self, stl: SubtileCoord) -> bool {
        stl.x >= 0 && stl.y >= 0 && stl.x < self.width && stl.y < self.height
    }

    fn index(&self, stl: SubtileCoord) -> Option<usize> {
        if self.in_bounds(stl) {
            Some((stl.y * self.width + stl.x) as usize)
        } else {
            None
        }
    }

    /// Block at a subtile.
    pub fn block(&self, stl: SubtileCoord) -> Option<&MapBlock> {
        self.index(stl).map(|i| &self.blocks[i])
    }

    /// Mutable block at a subtile.
    pub fn block_mut(&mut self, stl: SubtileCoord) -> Option<&mut MapBlock> {
        self.index(stl).map(move |i| &mut self.blocks[i])
    }

    /// Off-grid subtiles are solid.
    pub fn blocks_movement(&self, stl: SubtileCoord) -> bool {
        self.block(stl).map(|b| b.blocks_movement()).unwrap_or(true)
    }

    /// Floor height; off-grid subtiles report the ceiling.
    pub fn floor_at(&self, stl: SubtileCoord) -> MapCoord {
        self.block(stl).map(|b| b.floor).unwrap_or(DEFAULT_CEILING)
    }

    /// Ceiling height; off-grid subtiles report the ceiling.
    pub fn ceiling_at(&self, stl: SubtileCoord) -> MapCoord {
        self.block(stl).map(|b| b.ceiling).unwrap_or(DEFAULT_CEILING)
    }

    /// Slab kind at a subtile.
    pub fn slab_at(&self, stl: SubtileCoord) -> Option<SlabKind> {
        self.block(stl).map(|b| b.slab)
    }

    /// Owner at a subtile.
    pub fn owner_at(&self, stl: SubtileCoord) -> Option<PlayerId> {
        self.block(stl).and_then(|b| b.owner)
    }

    /// Set all 3x3 subtiles of a slab.
    pub fn set_slab(&mut self, slab_x: i32, slab_y: i32, kind: SlabKind, owner: Option<PlayerId>) {
        for dy in 0..STL_PER_SLB {
            for dx in 0..STL_PER_SLB {
                let stl = SubtileCoord::new(slab_x * STL_PER_SLB + dx, slab_y * STL_PER_SLB + dy);
                if let Some(block) = self.block_mut(stl) {
                    block.set_slab(kind, owner);
                }
            }
        }
    }

    /// Set the slab containing a subtile.
    pub fn set_slab_at(&mut self, stl: SubtileCoord, kind: SlabKind, owner: Option<PlayerId>) {
        let (sx, sy) = stl.slab();
        self.set_slab(sx, sy, kind, owner);
    }

    /// Fill a rectangle of slabs (inclusive corners).
    pub fn fill_slabs(&mut self, from: (i32, i32), to: (i32, i32), kind: SlabKind, owner: Option<PlayerId>) {
        for sy in from.1.min(to.1)..=from.1.max(to.1) {
            for sx in from.0.min(to.0)..=from.0.max(to.0) {
                self.set_slab(sx, sy, kind, owner);
            }
        }
    }

    /// Override the floor height of one subtile.
    pub fn set_floor(&mut self, stl: SubtileCoord, floor: MapCoord) {
        if let Some(block) = self.block_mut(stl) {
            block.floor = floor;
        }
    }

    /// Override the ceiling height of one subtile.
    pub fn set_ceiling(&mut self, stl: SubtileCoord, ceiling: MapCoord) {
        if let Some(block) = self.block_mut(stl) {
            block.ceiling = ceiling;
        }
    }

    /// Subtile revealed for a player.
    pub fn is_revealed(&self, stl: SubtileCoord, player: PlayerId) -> bool {
        self.block(stl).map(|b| b.is_revealed(player)).unwrap_or(false)
    }

    /// Reveal a square of subtiles around `center`.
    pub fn reveal(&mut self, player: PlayerId, center: SubtileCoord, radius: i32) {
        let Some(bit) = player.reveal_bit() else {
            return;
        };
        let r = radius.max(0);
        for y in center.y - r..=center.y + r {
            for x in center.x - r..=center.x + r {
                if let Some(block) = self.block_mut(SubtileCoord::new(x, y)) {
                    block.revealed |= bit;
                }
            }
        }
    }

    /// Reveal the whole grid for a player.
    pub fn reveal_all(&mut self, player: PlayerId) {
        if let Some(bit) = player.reveal_bit() {
            for block in &mut self.blocks {
                block.revealed |= bit;
            }
        }
    }

    /// Iterate blocks in row-major order.
    pub fn blocks(&self) -> impl Iterator<Item = (SubtileCoord, &MapBlock)> {
        let width = self.width;
        self.blocks
            .iter()
            .enumerate()
            .map(move |(i, b)| (SubtileCoord::new(i as i32 % width, i as i32 / width), b))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_writes_all_subtiles() {
        let mut map = MapGrid::new(4, 4, SlabKind::Earth);
        map.set_slab(1, 2, SlabKind::Path, None);
        for y in 6..9 {
            for x in 3..6 {
                assert_eq!(map.slab_at(SubtileCoord::new(x, y)), Some(SlabKind::Path));
                assert!(!map.blocks_movement(SubtileCoord::new(x, y)));
            }
        }
        assert!(map.blocks_movement(SubtileCoord::new(2, 6)));
    }

    #[test]
    fn test_out_of_grid_is_solid() {
        let map = MapGrid::new(2, 2, SlabKind::Path);
        assert!(map.blocks_movement(SubtileCoord::new(-1, 0)));
        assert!(map.blocks_movement(SubtileCoord::new(0, 6)));
        assert!(!map.blocks_movement(SubtileCoord::new(5, 5)));
        assert_eq!(map.max_coord_x(), 6 * 256 - 1);
    }

    #[test]
    fn test_categories() {
        assert!(SlabKind::Wall.is_tall());
        assert!(SlabKind::Door.is_tall());
        assert!(SlabKind::Lava.is_ground());
        assert!(SlabKind::Path.is_claimable_ground());
        assert!(!SlabKind::Room.is_claimable_ground());
        assert!(SlabKind::Earth.is_claimable_tall());
        assert!(!SlabKind::Rock.is_diggable());
    }

    #[test]
    fn test_reveal() {
        let mut map = MapGrid::new(3, 3, SlabKind::Path);
        let p = PlayerId(1);
        map.reveal(p, SubtileCoord::new(4, 4), 1);
        assert!(map.is_revealed(SubtileCoord::new(3, 5), p));
        assert!(!map.is_revealed(SubtileCoord::new(2, 4), p));
        assert!(!map.is_revealed(SubtileCoord::new(4, 4), PlayerId(2)));
    }

    #[test]
    fn test_dig_keeps_reveal() {
        let mut map = MapGrid::new(2, 2, SlabKind::Earth);
        map.reveal_all(PlayerId(0));
        map.set_slab_at(SubtileCoord::new(4, 4), SlabKind::Path, None);
        let block = map.block(SubtileCoord::new(4, 4)).unwrap();
        assert_eq!(block.floor, DEFAULT_FLOOR);
        assert!(block.is_revealed(PlayerId(0)));
    }
}
