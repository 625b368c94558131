//! C6: final quadtree/codebook emitter.
//!
//! Compacts a light's scratch template tree (C5's output) into the packed,
//! BFS-ordered buffer the reconstruction sampler (C7) walks, per §4.6.
//! Sizing mirrors `ShadowMapGenerationPass.cpp`'s per-slot buffer
//! allocation (`counter_codebook[slot] * sizeof(CodeBookEntry)`,
//! `counter_quadtree[slot] * sizeof(QuadTreeNode)`), generalized from the
//! original's fixed worst-case buffer to exactly-sized buffers driven by
//! readback counters, as §4.6 requires.

use crate::quadtree::{CodeWord, CompressionModel, NodePayload, QuadNode, TemplateNode};

/// Counters C5 reports back per slot after a tile build, per §4.6's
/// sizing rule. `repr(C)` and POD so the coordinator (C8) can read it
/// straight out of a mapped readback buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct SlotCounters {
    pub codebook_count: u32,
    pub quadtree_count: u32,
    pub tile_count: u32,
}

impl SlotCounters {
    pub fn final_codebook_len(&self) -> u32 {
        self.codebook_count.max(1)
    }

    pub fn final_quadtree_len(&self) -> u32 {
        self.quadtree_count + self.tile_count
    }
}

/// The packed buffers C7 and the shading kernel read for one slot.
#[derive(Debug, Clone, Default)]
pub struct FinalBuffers {
    pub nodes: Vec<QuadNode>,
    pub codebook: Vec<CodeWord>,
}

/// Rewrite one tile's template tree (as produced by
/// [`crate::tile_builder::build_tile`]) into BFS-ordered final buffers,
/// deduplicating codewords referenced by the final tree. For a light whose
/// shadow map spans multiple 32x32 tiles, the coordinator calls this once
/// per tile and is responsible for grafting the per-tile roots under the
/// light's own super-root, §4.5/§4.6 describe the per-tile and per-slot
/// sizing rules but not that stitching, which is left to the coordinator.
///
/// `template` is the scratch tree with `level`-tagged nodes and the
/// scratch-local `first_child` addressing documented on
/// [`NodePayload::Interior`]; `template_codebook` is the scratch codebook
/// [`crate::tile_builder`] built it against.
pub fn emit(template: &[TemplateNode], template_codebook: &[CompressionModel]) -> FinalBuffers {
    if template.is_empty() {
        return FinalBuffers::default();
    }

    let root_index = template.len() - 1;
    let mut final_nodes = Vec::with_capacity(template.len());
    let mut final_codebook = Vec::new();
    let mut codeword_remap: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();

    // BFS from the root, per §4.6 "interior nodes are written first in BFS
    // level order". `queue` holds scratch-tree indices; `final_nodes`
    // grows in the same order, so a node's position in `final_nodes` is
    // known before its children are appended.
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root_index);
    final_nodes.push(QuadNode { is_leaf: 0, index: 0 });

    let mut cursor = 0usize;
    while let Some(scratch_index) = queue.pop_front() {
        let node = &template[scratch_index];

        match node.payload {
            NodePayload::Leaf { codeword } => {
                let final_index = *codeword_remap.entry(codeword).or_insert_with(|| {
                    let index = final_codebook.len() as u32;
                    final_codebook.push(CodeWord::from(&template_codebook[codeword as usize]));
                    index
                });

                final_nodes[cursor] = QuadNode {
                    is_leaf: 1,
                    index: final_index,
                };
            }
            NodePayload::Interior { first_child } => {
                let children_scratch = scratch_children(template, node.level, first_child);
                let first_final_child = final_nodes.len() as u32;

                for &child_scratch in &children_scratch {
                    queue.push_back(child_scratch);
                    final_nodes.push(QuadNode { is_leaf: 0, index: 0 });
                }

                final_nodes[cursor] = QuadNode {
                    is_leaf: 0,
                    index: first_final_child,
                };
            }
        }

        cursor += 1;
    }

    FinalBuffers {
        nodes: final_nodes,
        codebook: final_codebook,
    }
}

/// Recover the four scratch-tree indices of an interior node's children.
/// The scratch tree stores each level's nodes contiguously (finest first);
/// `first_child` is an index into the *next finer* level's own grid, so
/// this walks forward from the node's own level to find that level's base
/// offset in `template`, then the grid stride.
fn scratch_children(template: &[TemplateNode], parent_level: u32, first_child: u32) -> [usize; 4] {
    let child_level = parent_level + 1;

    let mut base = 0usize;
    let mut level_len = 0usize;
    for node in template {
        if node.level == child_level {
            level_len += 1;
        }
    }
    // The finer level's nodes were appended before any coarser level, so
    // its base offset is just the count of nodes at levels > child_level
    // that were appended earlier, i.e. levels strictly finer than it.
    for node in template {
        if node.level > child_level {
            base += 1;
        } else {
            break;
        }
    }

    let side = (level_len as f64).sqrt().round() as u32;

    [
        base + first_child as usize,
        base + (first_child + 1) as usize,
        base + (first_child + side) as usize,
        base + (first_child + side + 1) as usize,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::quadtree::CodewordTable;
    use crate::tile_builder::{build_tile, TileOutcome};

    #[test]
    fn flat_tile_emits_single_leaf_and_one_codeword() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let depth = vec![0.25f32; 32 * 32];

        let TileOutcome::Built(result) = build_tile(&depth, 32, &mut codewords, &config) else {
            panic!("expected tile to build");
        };

        let buffers = emit(&result.nodes, codewords.codebook());
        assert_eq!(buffers.nodes.len(), 1);
        assert_eq!(buffers.codebook.len(), 1);
        assert_eq!(buffers.nodes[0].is_leaf, 1);
    }

    #[test]
    fn every_codeword_is_referenced_by_some_leaf() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let side = 32u32;
        let mut depth = vec![0.0f32; (side * side) as usize];
        for y in 0..side {
            for x in 0..side {
                let block = (x / 2 + y / 2) % 2;
                depth[(y * side + x) as usize] = if block == 0 { 0.1 } else { 0.9 };
            }
        }

        let TileOutcome::Built(result) = build_tile(&depth, side, &mut codewords, &config) else {
            panic!("expected tile to build");
        };

        let buffers = emit(&result.nodes, codewords.codebook());
        let referenced: std::collections::HashSet<u32> = buffers
            .nodes
            .iter()
            .filter(|n| n.is_leaf == 1)
            .map(|n| n.index)
            .collect();

        assert_eq!(referenced.len(), buffers.codebook.len());
    }

    #[test]
    fn sizing_matches_counter_rule() {
        let counters = SlotCounters {
            codebook_count: 0,
            quadtree_count: 5,
            tile_count: 2,
        };
        assert_eq!(counters.final_codebook_len(), 1);
        assert_eq!(counters.final_quadtree_len(), 7);
    }
}
