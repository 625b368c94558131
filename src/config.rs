//! Tunable constants for the shadow atlas.
//!
//! Named after the quantities §4 calls out explicitly: atlas root
//! size, level count, tile size, hash table capacity, compression
//! tolerance and quality factor, depth bias, and ring depth. None of these
//! are hardwired constants in the core; a caller picks a [`Config`] once at
//! startup and every component is built from it.

/// Sentinel marking a free-list entry or light placement as absent.
///
/// Matches `ShadowPoolResetPass.cpp::InitBuffers`'s `0xFFFFFFFF` convention.
pub const UNPLACED: u32 = 0xFFFF_FFFF;

/// Codebook hash table "empty" sentinel, per §9's open question:
/// the source clears the index buffer with `0xFFFFFFFF - 1` rather than
/// `0xFFFFFFFF`. Preserved exactly.
pub const HASH_EMPTY: u32 = 0xFFFF_FFFE;

/// Codebook hash table "in-flight" sentinel (another thread is inserting).
pub const HASH_IN_FLIGHT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Atlas root tile resolution in texels, per side. Default 2048.
    pub smax: u32,
    /// Number of resolution levels, `L ∈ [0, lmax)`. Default 7.
    pub lmax: u32,
    /// Depth of the frame ring (`N` in §4.8). Default 3.
    pub ring_depth: usize,
    /// Upper bound on lights touched by a single 32x32 tile dispatch.
    pub max_lights_per_tile: u32,
    /// Tile width in texels for the quadtree builder. Default 32.
    pub tile_width: u32,
    /// Tile height in texels for the quadtree builder. Default 32.
    pub tile_height: u32,
    /// Side length of the open-addressed codeword hash table. Default 4096.
    pub hash_table_side: u32,
    /// Max absolute error tolerance for leaf-model acceptance (τ). Default 0.005.
    pub tau: f32,
    /// Quality constant `k` in the projector's resolution choice. Default 1.0.
    pub quality_k: f32,
    /// Slope-scaled depth bias for the shadow-map producer. Default 5.0.
    pub depth_bias_slope: f32,
    /// Constant depth bias. Default 150.0.
    pub depth_bias_constant: f32,
    /// Depth bias clamp. Default 0.2.
    pub depth_bias_clamp: f32,
    /// Near plane used when rendering spot shadow maps. Default 0.1.
    pub shadow_near: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smax: 2048,
            lmax: 7,
            ring_depth: 3,
            max_lights_per_tile: 1024,
            tile_width: 32,
            tile_height: 32,
            hash_table_side: 4096,
            tau: 0.005,
            quality_k: 1.0,
            depth_bias_slope: 5.0,
            depth_bias_constant: 150.0,
            depth_bias_clamp: 0.2,
            shadow_near: 0.1,
        }
    }
}

impl Config {
    /// Total number of leaf slots in the open-addressed codeword table.
    pub fn hash_table_len(&self) -> usize {
        (self.hash_table_side as usize) * (self.hash_table_side as usize)
    }

    pub fn tile_texel_count(&self) -> u32 {
        self.tile_width * self.tile_height
    }
}
