//! C3: slot allocator.
//!
//! `place()` runs the five steps of §4.3 as a single pass over all lights:
//! a "single compute dispatch" processing lights serially within the
//! dispatch to preserve free-list integrity, which on the CPU is simply a
//! sequential loop, which is what this module is. The coordinator (C8) is
//! responsible for staging the GPU-visible mirror of this state and
//! reading results back; this module only owns the free-list bookkeeping
//! itself, so it's unit-testable without any GPU plumbing at all.
//!
//! `release()` pushes a slot straight back onto its own level's free list
//! and stops there. Coalescing it back into its parent was tried and
//! dropped: `FreeLists::new` (`src/slot.rs`) pre-populates every level's
//! free list with its full `4^L` slots independently at startup, so a
//! parent slot already sits on its own level's list the moment its
//! children's list looks fully free, nothing marks that parent as "split"
//! versus "untouched". Merging on every-buddy-free would have pushed a
//! second, indistinguishable copy of that same parent id onto the list,
//! breaking the free-list-is-a-permutation invariant (§8) and eventually
//! handing the same slot id to two lights. See `DESIGN.md`.

use std::rc::Rc;

use crate::atlas::{AtlasGeometry, Level};
use crate::config::UNPLACED;
use crate::projector::Desired;
use crate::slot::{FreeLists, Placement};

/// Output of a single `place()` pass, per §4.3 step 5.
#[derive(Debug, Clone, Default)]
pub struct PlacementUpdate {
    /// Light indices whose slot id changed this frame (§3's definition of
    /// "level-changed"), in ascending light-index order per the allocator's
    /// tie-break rule.
    pub level_changed: Vec<u32>,
}

/// Owns its geometry via `Rc` rather than a borrow, so the coordinator
/// (C8) can hold an allocator and the same geometry side by side without a
/// self-referential struct, geometry is rebuilt once at startup and never
/// mutated afterward, so shared ownership costs nothing a borrow wouldn't.
pub struct SlotAllocator {
    geometry: Rc<AtlasGeometry>,
    free: FreeLists,
}

impl SlotAllocator {
    pub fn new(geometry: Rc<AtlasGeometry>) -> Self {
        let free = FreeLists::new(&geometry);
        Self { geometry, free }
    }

    pub fn free_lists(&self) -> &FreeLists {
        &self.free
    }

    /// Run one allocation pass. `placement` is mutated in place to reflect
    /// the new assignment; lights are visited in ascending index order
    /// (the allocator's tie-break rule).
    pub fn place(&mut self, desired: &[Desired], placement: &mut Placement) -> PlacementUpdate {
        assert_eq!(desired.len(), placement.len());

        let mut update = PlacementUpdate::default();

        for light in 0..desired.len() {
            let current = placement.get(light);
            let desired_level = match desired[light] {
                Desired::Level(l) => Some(l),
                Desired::Unplaced => None,
            };

            let current_level = current.map(|s| self.geometry.level_of(s));

            match (current, current_level, desired_level) {
                // Unchanged: keep the slot (step 1).
                (Some(_), Some(cur), Some(want)) if cur == want => {}

                // Level changed or desired is now unplaced: release the old
                // slot (step 2), then try to acquire a new one (step 3/4).
                (old_slot, _, want) => {
                    if let Some(slot) = old_slot {
                        self.release(slot);
                    }

                    let new_slot = want.and_then(|level| self.acquire(level));
                    placement.set(light, new_slot);

                    if new_slot.is_some() && new_slot != old_slot {
                        update.level_changed.push(light as u32);
                    }
                }
            }
        }

        update
    }

    /// Step 3/4: pop the desired level's free list; on starvation, split a
    /// coarser level's slot into four and retry, recursing toward level 0
    /// until either a slot is found or level 0 itself is exhausted (in
    /// which case the light remains `UNPLACED` for this frame, §4.3 step
    /// 4, a normal outcome per §7, not an error).
    fn acquire(&mut self, level: Level) -> Option<u32> {
        if let Some(slot) = self.free.pop(level) {
            return Some(slot);
        }

        if level.0 == 0 {
            return None;
        }

        let coarser = Level(level.0 - 1);
        let parent = self.acquire(coarser)?;
        let children = self
            .geometry
            .children_of(parent)
            .expect("non-leaf level must have children");

        for &child in &children {
            self.free.push(level, child);
        }

        self.free.pop(level)
    }

    /// Step 2: return a slot to its own level's free list.
    fn release(&mut self, slot: u32) {
        let level = self.geometry.level_of(slot);
        self.free.push(level, slot);
    }

    pub fn is_unplaced(slot: Option<u32>) -> bool {
        slot.map(|s| s == UNPLACED).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn setup(lmax: u32) -> (Rc<AtlasGeometry>, Config) {
        let config = Config {
            lmax,
            ..Config::default()
        };
        let geometry = Rc::new(AtlasGeometry::new(&config));
        (geometry, config)
    }

    #[test]
    fn single_stationary_light_keeps_its_slot() {
        let (geometry, _) = setup(7);
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));
        let mut placement = Placement::new(1);

        let update = allocator.place(&[Desired::Level(Level(2))], &mut placement);
        let slot = placement.get(0).unwrap();
        assert_eq!(update.level_changed, vec![0]);

        let update2 = allocator.place(&[Desired::Level(Level(2))], &mut placement);
        assert!(update2.level_changed.is_empty());
        assert_eq!(placement.get(0), Some(slot));
    }

    #[test]
    fn level_change_releases_old_slot_and_acquires_new() {
        let (geometry, _) = setup(7);
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));
        let mut placement = Placement::new(1);

        allocator.place(&[Desired::Level(Level(2))], &mut placement);
        let old_slot = placement.get(0).unwrap();

        let update = allocator.place(&[Desired::Level(Level(4))], &mut placement);
        assert_eq!(update.level_changed, vec![0]);

        let new_slot = placement.get(0).unwrap();
        assert_ne!(old_slot, new_slot);
        assert_eq!(geometry.level_of(new_slot), Level(4));

        // The old slot must be back on its level's free list.
        assert!(allocator
            .free_lists()
            .iter_level(Level(2))
            .any(|s| s == old_slot));
    }

    #[test]
    fn slot_starvation_never_double_allocates() {
        let (geometry, _) = setup(4);
        let deepest = Level(geometry.lmax() - 1);
        let capacity = 4u32.pow(deepest.0) as usize;

        // One more light than capacity at the deepest level.
        let light_count = capacity + 5;
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));
        let mut placement = Placement::new(light_count);
        let desired: Vec<_> = (0..light_count).map(|_| Desired::Level(deepest)).collect();

        allocator.place(&desired, &mut placement);

        let mut used = std::collections::HashSet::new();
        let mut placed_count = 0;
        for slot in placement.iter().flatten() {
            assert!(used.insert(slot), "slot {slot} double-allocated");
            placed_count += 1;
        }

        assert_eq!(placed_count, capacity);
        // The remaining lights stay UNPLACED, a normal outcome per §7.
        assert_eq!(light_count - placed_count, 5);
    }

    #[test]
    fn splitting_a_coarser_level_yields_four_usable_children() {
        let (geometry, _) = setup(3);
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));

        // Drain level 1's free list directly so the next acquire at level 1
        // must split level 0.
        while allocator.free.pop(Level(1)).is_some() {}

        let mut placement = Placement::new(1);
        let update = allocator.place(&[Desired::Level(Level(1))], &mut placement);

        assert_eq!(update.level_changed, vec![0]);
        assert!(placement.get(0).is_some());
        assert_eq!(allocator.free_lists().iter_level(Level(0)).count(), 0);
        // Three of the four freshly split children remain available.
        assert_eq!(allocator.free_lists().iter_level(Level(1)).count(), 3);
    }

    #[test]
    fn repeated_level_changes_never_duplicate_free_list_entries() {
        let (geometry, _) = setup(4);
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));
        let mut placement = Placement::new(1);

        let levels = [Level(2), Level(1), Level(3), Level(1), Level(2)];
        for level in levels {
            allocator.place(&[Desired::Level(level)], &mut placement);

            for l in 0..geometry.lmax() {
                let on_list: Vec<u32> = allocator.free_lists().iter_level(Level(l)).collect();
                let unique: std::collections::HashSet<u32> = on_list.iter().copied().collect();
                assert_eq!(
                    on_list.len(),
                    unique.len(),
                    "level {l} free list has a duplicate after placing at {level:?}"
                );
            }
        }
    }

    #[test]
    fn unplaced_light_frees_its_slot() {
        let (geometry, _) = setup(5);
        let mut allocator = SlotAllocator::new(Rc::clone(&geometry));
        let mut placement = Placement::new(1);

        allocator.place(&[Desired::Level(Level(2))], &mut placement);
        let old_slot = placement.get(0).unwrap();

        allocator.place(&[Desired::Unplaced], &mut placement);
        assert_eq!(placement.get(0), None);
        assert!(allocator
            .free_lists()
            .iter_level(Level(2))
            .any(|s| s == old_slot));
    }
}
