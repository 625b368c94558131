//! C4: shadow-map producer.
//!
//! For each level-changed light, builds the view/projection a depth-only
//! pass renders against. Grounded in `UpdateCameraConstants`
//! (`ShadowPoolResetPass.cpp`) for the matrix fields a shadow pass needs,
//! and in `rendinator`'s `shadow.rs::create_cascades` for the shape of
//! "derive a projection from the light's own geometry, not the main
//! camera's", there it's an orthographic fit over transformed cascade
//! corners, here it's a perspective fit over the spot cone, same overall
//! computation shape (build a view matrix from the light, then a
//! projection matched to its extent).

use glam::{Mat4, Vec3};

use crate::atlas::{AtlasGeometry, Level};
use crate::config::Config;
use crate::light::{Light, LightKind};

/// Slope-scaled/constant depth bias for a shadow-only pass, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub slope: f32,
    pub constant: f32,
    pub clamp: f32,
}

/// Depth-only render target description for one light's shadow pass.
#[derive(Debug, Clone, Copy)]
pub struct ShadowPassTarget {
    pub light_index: u32,
    pub resolution: u32,
    pub view_proj: Mat4,
    pub near: f32,
    pub far: f32,
    pub depth_bias: DepthBias,
}

/// Build the render target description for `light` at `level`, or `None`
/// if the light is a point light (skipped by the rasterizer per §9's first
/// open question), the caller is expected to have already filtered to
/// level-changed, non-`Unplaced` lights via C3's output.
pub fn shadow_pass_target(
    light_index: u32,
    light: &Light,
    level: Level,
    geometry: &AtlasGeometry,
    config: &Config,
) -> Option<ShadowPassTarget> {
    let LightKind::Spot { direction, outer_angle } = light.kind else {
        return None;
    };

    let resolution = geometry.resolution_of(level);
    let near = config.shadow_near;
    let far = light.range;

    let up = pick_up_vector(direction);
    let view = Mat4::look_at_lh(light.position, light.position + direction, up);

    // Reversed-Z D3D-style: far maps to 0, near maps to 1.
    let proj = reversed_z_perspective_lh(outer_angle, 1.0, near, far);

    let depth_bias = DepthBias {
        slope: config.depth_bias_slope,
        constant: config.depth_bias_constant,
        clamp: config.depth_bias_clamp,
    };

    Some(ShadowPassTarget {
        light_index,
        resolution,
        view_proj: proj * view,
        near,
        far,
        depth_bias,
    })
}

fn pick_up_vector(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

/// Left-handed perspective projection with reversed depth (far -> 0, near
/// -> 1), matching the D3D convention the original's `DepthPass` is
/// configured for (`slopeScaledDepthBias`/`depthBias` tuned against a
/// reversed-Z buffer).
fn reversed_z_perspective_lh(fov_y_full_angle: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let fov_y = fov_y_full_angle;
    let f = 1.0 / (fov_y * 0.5).tan();

    Mat4::from_cols_array(&[
        f / aspect, 0.0, 0.0, 0.0,
        0.0, f, 0.0, 0.0,
        0.0, 0.0, near / (near - far), 1.0,
        0.0, 0.0, (near * far) / (far - near), 0.0,
    ])
}
