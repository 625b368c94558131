//! C5: tile-based quadtree builder.
//!
//! CPU reference implementation of §4.5: both the testable ground truth
//! and the logic the WGSL tile-build shader (`shaders/tile_build.wgsl`)
//! mirrors one work-group per tile. Grounded in
//! `ShadowMapGenerationPass.cpp::InitDescriptorTableResource` for the
//! per-tile/per-level buffer sizing (`(curSize/32)^2` tiles at the root
//! level, `curSize /= 2` and tile count `*= 4` per level down) and in
//! §4.5's three-model leaf fit order.

use crate::config::Config;
use crate::quadtree::{CodewordTable, CompressionModel, NodePayload, TemplateNode};

/// Outcome of building one tile. `Failed` mirrors §4.5's "counter overflow
/// marks the tile failed" / §7's "entire frame is discarded" rule, the
/// coordinator is responsible for dropping the whole frame when any tile
/// reports `Failed`.
pub enum TileOutcome {
    Built(TileResult),
    Failed,
}

pub struct TileResult {
    pub nodes: Vec<TemplateNode>,
    /// `level_counts[l]` = number of nodes this tile contributed at level l,
    /// level 0 being the tile's own root.
    pub level_counts: Vec<u32>,
}

/// Build the template quadtree for one 32x32 (or `tile_size`x`tile_size`)
/// tile of depth samples. `depth` is row-major, `tile_size * tile_size`
/// texels.
pub fn build_tile(
    depth: &[f32],
    tile_size: u32,
    codewords: &mut CodewordTable,
    config: &Config,
) -> TileOutcome {
    assert_eq!(depth.len(), (tile_size * tile_size) as usize);
    assert!(tile_size.is_power_of_two() && tile_size >= 2);

    // Level (local_levels - 1) is the finest: tile_size/2 leaf cells per
    // side, each a 2x2 block of texels. Level 0 is the tile's own root.
    let local_levels = tile_size.trailing_zeros();

    let mut nodes = Vec::new();
    let mut level_counts = vec![0u32; local_levels as usize];

    // Leaf fit (step 1) + dedup (step 2), row-major order.
    let leaf_side = tile_size / 2;
    let mut grid: Vec<TemplateNode> = Vec::with_capacity((leaf_side * leaf_side) as usize);

    for by in 0..leaf_side {
        for bx in 0..leaf_side {
            let model = fit_region_exact(depth, tile_size, bx * 2, by * 2, 2, config.tau);

            if codewords.len() as u32 >= codewords.capacity() {
                return TileOutcome::Failed;
            }

            let codeword = codewords.insert(model, config);
            grid.push(TemplateNode {
                level: local_levels - 1,
                payload: NodePayload::Leaf { codeword },
            });
        }
    }

    level_counts[(local_levels - 1) as usize] = grid.len() as u32;
    nodes.extend(grid.clone());

    // Bottom-up merge (step 3): ascending local level toward the tile root.
    let mut current_side = leaf_side;

    for level in (0..local_levels - 1).rev() {
        let parent_side = current_side / 2;
        let region_size = tile_size >> level;
        let mut parent_grid = Vec::with_capacity((parent_side * parent_side) as usize);

        for py in 0..parent_side {
            for px in 0..parent_side {
                let idx = |dx: u32, dy: u32| -> usize {
                    let x = px * 2 + dx;
                    let y = py * 2 + dy;
                    (y * current_side + x) as usize
                };

                let children_idx = [idx(0, 0), idx(1, 0), idx(0, 1), idx(1, 1)];
                let same_leaf_type = children_idx
                    .iter()
                    .map(|&i| match grid[i].payload {
                        NodePayload::Leaf { codeword } => {
                            Some(std::mem::discriminant(&codewords.codebook()[codeword as usize]))
                        }
                        NodePayload::Interior { .. } => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .is_some_and(|tags| tags.windows(2).all(|w| w[0] == w[1]));

                let merged = same_leaf_type.then(|| {
                    fit_region_joint(depth, tile_size, px * region_size, py * region_size, region_size, config.tau)
                }).flatten();

                let node = match merged {
                    Some(model) => {
                        if codewords.len() as u32 >= codewords.capacity() {
                            return TileOutcome::Failed;
                        }
                        let codeword = codewords.insert(model, config);
                        TemplateNode {
                            level,
                            payload: NodePayload::Leaf { codeword },
                        }
                    }
                    None => TemplateNode {
                        level,
                        // Index of the top-left child within the next
                        // finer level's own row-major grid (that level's
                        // nodes were appended to `nodes` in the previous
                        // iteration); siblings sit at `+1`, `+current_side`
                        // and `+current_side+1`.
                        payload: NodePayload::Interior {
                            first_child: idx(0, 0) as u32,
                        },
                    },
                };

                parent_grid.push(node);
            }
        }

        level_counts[level as usize] = parent_grid.len() as u32;
        nodes.extend(parent_grid.clone());
        grid = parent_grid;
        current_side = parent_side;
    }

    TileOutcome::Built(TileResult { nodes, level_counts })
}

fn region_samples(depth: &[f32], tile_size: u32, x0: u32, y0: u32, size: u32) -> Vec<(f32, f32, f32)> {
    let mut samples = Vec::with_capacity((size * size) as usize);
    for dy in 0..size {
        for dx in 0..size {
            let x = x0 + dx;
            let y = y0 + dy;
            let u = dx as f32 / (size - 1).max(1) as f32;
            let v = dy as f32 / (size - 1).max(1) as f32;
            samples.push((u, v, depth[(y * tile_size + x) as usize]));
        }
    }
    samples
}

fn corner_values(depth: &[f32], tile_size: u32, x0: u32, y0: u32, size: u32) -> [f32; 4] {
    let at = |dx: u32, dy: u32| depth[((y0 + dy) * tile_size + (x0 + dx)) as usize];
    [at(0, 0), at(size - 1, 0), at(0, size - 1), at(size - 1, size - 1)]
}

/// Try the three models of §4.5 step 1 over a region, returning the first
/// that meets `tau` evaluated against every sample in the region; falls
/// back to the four-corner model (exact at the leaf's 2x2 granularity) if
/// none qualify, since a leaf must always get some model.
fn fit_region_exact(depth: &[f32], tile_size: u32, x0: u32, y0: u32, size: u32, tau: f32) -> CompressionModel {
    fit_region_joint(depth, tile_size, x0, y0, size, tau)
        .unwrap_or_else(|| CompressionModel::FourCorner {
            depths: corner_values(depth, tile_size, x0, y0, size),
        })
}

/// §4.5 step 3's "joint fit recomputed over the 4x resolution region":
/// evaluates each candidate model against every sample in the region (not
/// just its own corners), so a coarser candidate can only be accepted if
/// it actually tracks the finer structure underneath it.
fn fit_region_joint(depth: &[f32], tile_size: u32, x0: u32, y0: u32, size: u32, tau: f32) -> Option<CompressionModel> {
    let samples = region_samples(depth, tile_size, x0, y0, size);

    let mean = samples.iter().map(|&(_, _, d)| d).sum::<f32>() / samples.len() as f32;
    let constant_error = samples.iter().map(|&(_, _, d)| (d - mean).abs()).fold(0.0, f32::max);
    if constant_error <= tau {
        return Some(CompressionModel::ConstantDepth { depth: mean });
    }

    let corners = corner_values(depth, tile_size, x0, y0, size);
    let four_corner_error = samples
        .iter()
        .map(|&(u, v, d)| (d - bilinear(corners, u, v)).abs())
        .fold(0.0, f32::max);
    if four_corner_error <= tau {
        return Some(CompressionModel::FourCorner { depths: corners });
    }

    if let Some((normal, d, error)) = fit_plane(&samples) {
        if error <= tau {
            return Some(CompressionModel::Plane { normal, d });
        }
    }

    None
}

fn bilinear(corners: [f32; 4], u: f32, v: f32) -> f32 {
    let top = corners[0] * (1.0 - u) + corners[1] * u;
    let bottom = corners[2] * (1.0 - u) + corners[3] * u;
    top * (1.0 - v) + bottom * v
}

/// Least-squares plane `nx*u + ny*v + nz*w + d = 0` (solved as `w = a*u +
/// b*v + c`) over all samples in the region, per §4.5 step 1c generalized
/// from "solve the 3-point system on two triangles" (exact at 2x2) to a
/// least-squares fit at larger merge regions.
fn fit_plane(samples: &[(f32, f32, f32)]) -> Option<(([f32; 3]), f32, f32)> {
    let n = samples.len() as f64;
    let (mut su, mut sv, mut sw) = (0.0, 0.0, 0.0);
    let (mut suu, mut svv, mut suv, mut suw, mut svw) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for &(u, v, w) in samples {
        let (u, v, w) = (u as f64, v as f64, w as f64);
        su += u;
        sv += v;
        sw += w;
        suu += u * u;
        svv += v * v;
        suv += u * v;
        suw += u * w;
        svw += v * w;
    }

    // Normal equations for w = a*u + b*v + c.
    let m = [[suu, suv, su], [suv, svv, sv], [su, sv, n]];
    let rhs = [suw, svw, sw];

    let (a, b, c) = solve_3x3(m, rhs)?;

    let evaluate = |u: f32, v: f32| a as f32 * u + b as f32 * v + c as f32;
    let error = samples
        .iter()
        .map(|&(u, v, w)| (w - evaluate(u, v)).abs())
        .fold(0.0, f32::max);

    // Rewrite `w = a*u + b*v + c` as `a*u + b*v - w + c = 0`.
    Some(([a as f32, b as f32, -1.0], c as f32, error))
}

fn solve_3x3(m: [[f64; 3]; 3], rhs: [f64; 3]) -> Option<(f64, f64, f64)> {
    let det = |m: [[f64; 3]; 3]| -> f64 {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };

    let d = det(m);
    if d.abs() < 1e-9 {
        return None;
    }

    let replace_col = |col: usize| -> [[f64; 3]; 3] {
        let mut out = m;
        for row in 0..3 {
            out[row][col] = rhs[row];
        }
        out
    };

    let a = det(replace_col(0)) / d;
    let b = det(replace_col(1)) / d;
    let c = det(replace_col(2)) / d;
    Some((a, b, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tile_collapses_to_one_constant_leaf() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let depth = vec![0.5f32; 32 * 32];

        let outcome = build_tile(&depth, 32, &mut codewords, &config);
        let TileOutcome::Built(result) = outcome else {
            panic!("expected tile to build");
        };

        assert_eq!(codewords.len(), 1);
        let root = result.nodes.last().unwrap();
        assert_eq!(root.level, 0);
        assert!(root.is_leaf());
    }

    #[test]
    fn checkerboard_of_two_values_does_not_overmerge() {
        let config = Config::default();
        let mut codewords = CodewordTable::new(&config);
        let side = 32u32;
        let mut depth = vec![0.0f32; (side * side) as usize];

        for y in 0..side {
            for x in 0..side {
                let block_x = x / 2;
                let block_y = y / 2;
                let value = if (block_x + block_y) % 2 == 0 { 0.1 } else { 0.9 };
                depth[(y * side + x) as usize] = value;
            }
        }

        let outcome = build_tile(&depth, side, &mut codewords, &config);
        let TileOutcome::Built(result) = outcome else {
            panic!("expected tile to build");
        };

        // Every finest-level leaf is one of the two flat colors; nothing
        // above that level can legally merge, since a 4x4-or-larger region
        // always mixes both colors beyond tau.
        assert_eq!(codewords.len(), 2);
        let finest_level = result.level_counts.len() as u32 - 1;
        assert!(result.nodes.iter().filter(|n| n.level == finest_level).all(|n| n.is_leaf()));
        let root = result.nodes.last().unwrap();
        assert!(!root.is_leaf());
    }

    #[test]
    fn sloped_plane_fits_within_tolerance() {
        let config = Config {
            tau: 0.01,
            ..Config::default()
        };
        let mut codewords = CodewordTable::new(&config);
        let side = 32u32;
        let mut depth = vec![0.0f32; (side * side) as usize];

        for y in 0..side {
            for x in 0..side {
                let u = x as f32 / side as f32;
                let v = y as f32 / side as f32;
                depth[(y * side + x) as usize] = 0.3 * u + 0.2 * v + 0.1;
            }
        }

        let outcome = build_tile(&depth, side, &mut codewords, &config);
        let TileOutcome::Built(result) = outcome else {
            panic!("expected tile to build");
        };

        let root = result.nodes.last().unwrap();
        assert!(root.is_leaf());
        let NodePayload::Leaf { codeword } = root.payload else {
            unreachable!()
        };
        assert!(matches!(
            codewords.codebook()[codeword as usize],
            CompressionModel::Plane { .. }
        ));
    }

    #[test]
    fn tile_failure_is_reported_when_codebook_is_exhausted() {
        let config = Config {
            hash_table_side: 1,
            ..Config::default()
        };
        let mut codewords = CodewordTable::new(&config);
        let side = 4u32;
        // Every 2x2 leaf gets a distinct constant value so none dedup,
        // quickly exceeding a 1x1 = 1-entry codebook capacity.
        let mut depth = vec![0.0f32; (side * side) as usize];
        for (i, v) in depth.iter_mut().enumerate() {
            *v = i as f32 * 0.1;
        }

        let outcome = build_tile(&depth, side, &mut codewords, &config);
        assert!(matches!(outcome, TileOutcome::Failed));
    }
}
