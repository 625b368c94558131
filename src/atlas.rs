//! C1: atlas geometry.
//!
//! Pure functions of `(Smax, Lmax)`: slot id to level, level to resolution,
//! a level-L slot's first child id, and the free-list head for a level.
//! Slot ids are laid out the way `ShadowPoolResetPass.cpp::InitBuffers`
//! lays out `initShadowPoolData`: the first `Lmax` ids are reserved as
//! per-level free-list heads, and children of a level-L head occupy a
//! contiguous range ordered level by level after that.

use crate::config::{Config, UNPLACED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u32);

/// Precomputed slot/level geometry for a fixed `(Smax, Lmax)`. Building the
/// table is `O(4^Lmax)` once; every query after that is `O(1)`.
#[derive(Debug, Clone)]
pub struct AtlasGeometry {
    smax: u32,
    lmax: u32,
    /// `level_heads[L]` is the reserved free-list head slot id for level L.
    level_heads: Vec<u32>,
    /// `level_of[slot]` for every slot id in the table, including heads.
    level_of: Vec<u32>,
    /// `child_head_of[slot]` for level-L heads and interior leaf slots: the
    /// id of the first of the four level-(L+1) children. `None` at the
    /// deepest level.
    child_head_of: Vec<Option<u32>>,
}

impl AtlasGeometry {
    /// Build the table for `config`. Matches
    /// `ShadowPoolResetPass.cpp::InitBuffers`'s layout exactly: level heads
    /// first, then each level's `4^L` slots in id order.
    pub fn new(config: &Config) -> Self {
        let lmax = config.lmax;

        let mut level_heads = vec![0u32; lmax as usize];
        let mut level_add = 0u32;
        let mut slots_cur_level = 1u32;

        for l in 0..lmax {
            level_heads[l as usize] = lmax + level_add;
            level_add += slots_cur_level;
            slots_cur_level *= 4;
        }

        let total = lmax + level_add;
        let mut level_of = vec![0u32; total as usize];
        let mut child_head_of = vec![None; total as usize];

        for l in 0..lmax {
            level_of[level_heads[l as usize] as usize] = l;
        }

        slots_cur_level = 1;
        for l in 0..lmax {
            let head = level_heads[l as usize];
            for j in 0..slots_cur_level {
                let slot = head + j;
                level_of[slot as usize] = l;

                if l + 1 < lmax {
                    let child_head = level_heads[(l + 1) as usize] + j * 4;
                    child_head_of[slot as usize] = Some(child_head);
                }
            }
            slots_cur_level *= 4;
        }

        Self {
            smax: config.smax,
            lmax,
            level_heads,
            level_of,
            child_head_of,
        }
    }

    pub fn lmax(&self) -> u32 {
        self.lmax
    }

    pub fn slot_count(&self) -> usize {
        self.level_of.len()
    }

    /// The level a slot id belongs to. Panics if `slot` is out of range,
    /// mirroring the original's reliance on the table being exhaustively
    /// sized up front.
    pub fn level_of(&self, slot: u32) -> Level {
        Level(self.level_of[slot as usize])
    }

    /// Resolution in texels, per side, at level `L`: `Smax / 2^L`.
    pub fn resolution_of(&self, level: Level) -> u32 {
        self.smax >> level.0
    }

    /// The id of the first of the four children of a level-L slot, if `L`
    /// isn't the deepest level.
    pub fn child_head_of(&self, slot: u32) -> Option<u32> {
        self.child_head_of[slot as usize]
    }

    /// The reserved free-list head slot id for `level`.
    pub fn free_list_head(&self, level: Level) -> u32 {
        self.level_heads[level.0 as usize]
    }

    /// The parent of a slot, and this slot's index (0..4) among its
    /// siblings, if `slot` isn't at level 0. The inverse of
    /// [`Self::child_head_of`].
    pub fn parent_of(&self, slot: u32) -> Option<(u32, u32)> {
        let level = self.level_of(slot);
        if level.0 == 0 {
            return None;
        }

        let level_head = self.level_heads[level.0 as usize];
        let index_in_level = slot - level_head;

        let parent_level_head = self.level_heads[(level.0 - 1) as usize];
        let parent_index = index_in_level / 4;
        let sibling_index = index_in_level % 4;

        Some((parent_level_head + parent_index, sibling_index))
    }

    /// The four children of `slot`, if it isn't at the deepest level.
    pub fn children_of(&self, slot: u32) -> Option<[u32; 4]> {
        self.child_head_of(slot).map(|head| [head, head + 1, head + 2, head + 3])
    }

    /// Slots belonging to `level`, in id order, the initial link order of
    /// that level's free list.
    pub fn slots_at_level(&self, level: Level) -> std::ops::Range<u32> {
        let head = self.level_heads[level.0 as usize];
        let count = 4u32.pow(level.0);
        head..(head + count)
    }

    pub fn is_unplaced(slot: u32) -> bool {
        slot == UNPLACED
    }
}
