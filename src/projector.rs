//! C2: light bounding-sphere projector.
//!
//! Chooses the desired atlas level for a light from its screen-projected
//! radius. Pure and GPU-free: the coordinator calls this once per light per
//! frame on the CPU before handing desired levels to the allocator, which
//! matches how `ShadowPoolResetPass` folds the equivalent math into its
//! single compute dispatch, here it's plain enough to keep off the GPU
//! entirely, same as frustum math (`Camera::frustrum`) stays on the CPU
//! rather than in a shader elsewhere in this codebase.

use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::atlas::{AtlasGeometry, Level};
use crate::config::Config;
use crate::light::BoundingSphere;

#[derive(Debug, Clone, Copy)]
pub struct View {
    pub view: Mat4,
    pub inverse_proj: Mat4,
    pub viewport_size: UVec2,
    pub near: f32,
}

impl View {
    /// Vertical focal length in pixels, derived from the inverse projection
    /// the way `Camera::proj` implies it: `focal_y = viewport_height / (2 *
    /// tan(fov_y / 2))`, recovered here from `inverse_proj` so the projector
    /// doesn't need the raw fov.
    fn focal_y(&self) -> f32 {
        // inverse_proj.y_axis.y == tan(fov_y / 2) for a standard perspective
        // projection built with `Mat4::perspective_rh`.
        let half_tan = self.inverse_proj.y_axis.y.abs();
        (0.5 * self.viewport_size.y as f32) / half_tan.max(1e-6)
    }
}

/// The outcome of projecting a single light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desired {
    Level(Level),
    Unplaced,
}

/// Project `sphere` through `view` and choose the coarsest level whose
/// resolution is still at least `k * r_px` texels, per §4.2.
///
/// Monotonic: moving a light strictly farther from the camera shrinks
/// `r_px`, which can only pick an equal or smaller (coarser) level.
pub fn project(
    sphere: BoundingSphere,
    view: &View,
    geometry: &AtlasGeometry,
    config: &Config,
) -> Desired {
    // `look_at_rh` puts the look direction along -Z in view space, so a
    // point in front of the camera has negative `view_space.z`; negate
    // before testing/clamping so "behind the camera" and "closer than the
    // near plane" both key off the true forward distance, not its raw sign.
    let view_space = view.view.transform_point3(sphere.center);
    let forward_distance = -view_space.z;

    if forward_distance <= 0.0 {
        return Desired::Unplaced;
    }

    let z_view = forward_distance.max(view.near);

    let r_px = sphere.radius * (0.5 * view.viewport_size.y as f32) * view.focal_y() / z_view;

    if r_px < 1.0 {
        return Desired::Unplaced;
    }

    let target = config.quality_k * r_px;

    // Smallest power-of-two resolution that is still >= target, searched
    // from the coarsest level (highest L, smallest resolution) upward so
    // the result is the *largest* level (smallest map) satisfying the bound.
    let mut chosen = Level(0);
    for l in (0..geometry.lmax()).rev() {
        let resolution = geometry.resolution_of(Level(l)) as f32;
        if resolution >= target {
            chosen = Level(l);
            break;
        }
    }

    Desired::Level(chosen)
}

/// Convenience: build a `View` from a camera-like description. Kept
/// separate from `View` itself so callers that already have `glam`
/// matrices (the common case, per `crate::coordinator`) can skip it.
pub fn view_from_camera(
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    proj: Mat4,
    viewport_size: UVec2,
    near: f32,
) -> View {
    let view = Mat4::look_at_rh(eye, target, up);
    View {
        view,
        inverse_proj: proj.inverse(),
        viewport_size,
        near,
    }
}
