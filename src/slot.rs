//! Free-list and placement types shared between the allocator (C3) and the
//! coordinator (C8). Kept separate from `allocator.rs` so the per-light data
//! model (§3 "Free-list", "Light-placement") has a home independent of the
//! `place()` algorithm itself.

use crate::atlas::{AtlasGeometry, Level};
use crate::config::UNPLACED;

/// Per-level free lists as one flat array indexed by slot id, per §3:
/// `entry[s] = next free slot at same level, or NONE`.
#[derive(Debug, Clone)]
pub struct FreeLists {
    /// `next[slot]`, intrusive singly linked list, terminated by `UNPLACED`.
    next: Vec<u32>,
    /// Head slot id for each level's free list, or `UNPLACED` if empty.
    heads: Vec<u32>,
}

impl FreeLists {
    /// Build the initial state: every slot in the atlas is free, each
    /// level's list holding exactly that level's slots in id order.
    pub fn new(geometry: &AtlasGeometry) -> Self {
        let mut next = vec![UNPLACED; geometry.slot_count()];
        let mut heads = vec![UNPLACED; geometry.lmax() as usize];

        for l in 0..geometry.lmax() {
            let level = Level(l);
            let range = geometry.slots_at_level(level);
            heads[l as usize] = range.start;

            for slot in range.clone() {
                next[slot as usize] = if slot + 1 < range.end {
                    slot + 1
                } else {
                    UNPLACED
                };
            }
        }

        Self { next, heads }
    }

    pub fn head(&self, level: Level) -> Option<u32> {
        let head = self.heads[level.0 as usize];
        (head != UNPLACED).then_some(head)
    }

    /// Pop the head of `level`'s free list, if non-empty.
    pub fn pop(&mut self, level: Level) -> Option<u32> {
        let head = self.heads[level.0 as usize];
        if head == UNPLACED {
            return None;
        }

        self.heads[level.0 as usize] = self.next[head as usize];
        self.next[head as usize] = UNPLACED;
        Some(head)
    }

    /// Push `slot` onto the head of `level`'s free list.
    pub fn push(&mut self, level: Level, slot: u32) {
        self.next[slot as usize] = self.heads[level.0 as usize];
        self.heads[level.0 as usize] = slot;
    }

    /// All slots currently on `level`'s free list, head first. Used by
    /// tests to check the permutation invariant (§8).
    pub fn iter_level(&self, level: Level) -> impl Iterator<Item = u32> + '_ {
        let mut cur = self.heads[level.0 as usize];
        std::iter::from_fn(move || {
            if cur == UNPLACED {
                None
            } else {
                let slot = cur;
                cur = self.next[slot as usize];
                Some(slot)
            }
        })
    }
}

/// `light-index -> slot-id or UNPLACED`, per §3 "Light-placement".
#[derive(Debug, Clone)]
pub struct Placement {
    slots: Vec<u32>,
}

impl Placement {
    pub fn new(light_count: usize) -> Self {
        Self {
            slots: vec![UNPLACED; light_count],
        }
    }

    pub fn get(&self, light: usize) -> Option<u32> {
        let slot = self.slots[light];
        (slot != UNPLACED).then_some(slot)
    }

    pub fn set(&mut self, light: usize, slot: Option<u32>) {
        self.slots[light] = slot.unwrap_or(UNPLACED);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<u32>> + '_ {
        self.slots.iter().map(|&s| (s != UNPLACED).then_some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn initial_free_list_is_level_slots_in_id_order() {
        let config = Config {
            lmax: 3,
            ..Config::default()
        };
        let geometry = AtlasGeometry::new(&config);
        let free = FreeLists::new(&geometry);

        for l in 0..3 {
            let level = Level(l);
            let expected: Vec<u32> = geometry.slots_at_level(level).collect();
            let actual: Vec<u32> = free.iter_level(level).collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn pop_then_push_restores_list() {
        let config = Config {
            lmax: 2,
            ..Config::default()
        };
        let geometry = AtlasGeometry::new(&config);
        let mut free = FreeLists::new(&geometry);

        let before: Vec<u32> = free.iter_level(Level(1)).collect();
        let popped = free.pop(Level(1)).unwrap();
        free.push(Level(1), popped);
        let after: Vec<u32> = free.iter_level(Level(1)).collect();

        assert_eq!(before, after);
    }

    #[test]
    fn placement_round_trips_unplaced() {
        let mut placement = Placement::new(4);
        placement.set(2, Some(7));
        assert_eq!(placement.get(0), None);
        assert_eq!(placement.get(2), Some(7));
    }
}
