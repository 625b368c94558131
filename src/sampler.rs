//! C7: reconstruction sampler.
//!
//! Descends a light's packed quadtree at a UV to recover a depth value and
//! an occlusion test, per §4.7. Also rebuilds a dense diagnostic texture,
//! grounded in `ShadowMapReconstruction.cpp::InitReconstructTextureBuffers`
//! (one R32Float texture per slot, `64x64` thread groups dispatched per
//! light), the diagnostic textures are one-per-slot, not one-per-light,
//! sized by `resolution_of(level_of(slot))`.

use crate::emitter::FinalBuffers;
use crate::quadtree::CodeWord;

/// Descend `buffers`' packed quadtree at `(u, v)` and evaluate the leaf
/// model reached. Returns `None` only if `buffers` is empty (a slot with
/// no final tree, e.g. the light is `UNPLACED` and the caller should
/// treat it as fully lit rather than calling this at all; kept as an
/// `Option` so a defensive caller doesn't need to special-case that
/// itself).
pub fn reconstruct_depth(buffers: &FinalBuffers, u: f32, v: f32) -> Option<f32> {
    if buffers.nodes.is_empty() {
        return None;
    }

    let mut node_index = 0usize;
    let (mut u, mut v) = (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0));

    loop {
        let node = buffers.nodes[node_index];
        if node.is_leaf == 1 {
            let codeword: CodeWord = buffers.codebook[node.index as usize];
            return Some(codeword.to_model().evaluate(u, v));
        }

        // Quadrant order matches the builder's row-major child order:
        // top-left, top-right, bottom-left, bottom-right.
        let (col, row) = ((u >= 0.5) as usize, (v >= 0.5) as usize);
        let child_offset = row * 2 + col;
        node_index = node.index as usize + child_offset;

        u = (u - 0.5 * col as f32) * 2.0;
        v = (v - 0.5 * row as f32) * 2.0;
    }
}

/// §4.7's occlusion test: the reconstructed depth is strictly nearer the
/// light (smaller, under this crate's reversed-Z convention from C4) than
/// `ref_depth`.
pub fn is_occluded(buffers: &FinalBuffers, u: f32, v: f32, ref_depth: f32) -> bool {
    match reconstruct_depth(buffers, u, v) {
        Some(reconstructed) => reconstructed < ref_depth,
        None => false,
    }
}

/// Rebuild a dense `resolution x resolution` depth texture by sampling the
/// tree once per texel, for the diagnostic overlay path.
pub fn rebuild_dense_texture(buffers: &FinalBuffers, resolution: u32) -> Vec<f32> {
    let mut out = vec![0.0f32; (resolution * resolution) as usize];
    for y in 0..resolution {
        for x in 0..resolution {
            let u = (x as f32 + 0.5) / resolution as f32;
            let v = (y as f32 + 0.5) / resolution as f32;
            out[(y * resolution + x) as usize] = reconstruct_depth(buffers, u, v).unwrap_or(1.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::emitter::emit;
    use crate::quadtree::CodewordTable;
    use crate::tile_builder::{build_tile, TileOutcome};

    #[test]
    fn flat_tile_reconstructs_the_constant_everywhere() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let depth = vec![0.37f32; 32 * 32];

        let TileOutcome::Built(result) = build_tile(&depth, 32, &mut codewords, &config) else {
            panic!("expected tile to build");
        };
        let buffers = emit(&result.nodes, codewords.codebook());

        for &(u, v) in &[(0.0, 0.0), (0.25, 0.75), (0.99, 0.01)] {
            let depth = reconstruct_depth(&buffers, u, v).unwrap();
            assert!((depth - 0.37).abs() < 1e-5);
        }
    }

    #[test]
    fn checkerboard_reconstructs_matching_quadrant_colors() {
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

        // Sample the exact center of each finest-level texel block and
        // compare against the source value.
        for y in 0..side {
            for x in 0..side {
                let u = (x as f32 + 0.5) / side as f32;
                let v = (y as f32 + 0.5) / side as f32;
                let expected = depth[(y * side + x) as usize];
                let reconstructed = reconstruct_depth(&buffers, u, v).unwrap();
                assert!((reconstructed - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn occlusion_test_compares_against_reference_depth() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let depth = vec![0.2f32; 32 * 32];
        let TileOutcome::Built(result) = build_tile(&depth, 32, &mut codewords, &config) else {
            panic!("expected tile to build");
        };
        let buffers = emit(&result.nodes, codewords.codebook());

        assert!(is_occluded(&buffers, 0.5, 0.5, 0.5));
        assert!(!is_occluded(&buffers, 0.5, 0.5, 0.1));
    }

    #[test]
    fn dense_rebuild_matches_pointwise_reconstruction() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let depth = vec![0.6f32; 32 * 32];
        let TileOutcome::Built(result) = build_tile(&depth, 32, &mut codewords, &config) else {
            panic!("expected tile to build");
        };
        let buffers = emit(&result.nodes, codewords.codebook());

        let dense = rebuild_dense_texture(&buffers, 8);
        assert!(dense.iter().all(|&d| (d - 0.6).abs() < 1e-5));
    }
}
