//! Light data model (§3 "Light").
//!
//! A light is identified by its index into the scene's light list (a
//! stable index, not a slot id). §3's open question on point lights
//! is resolved here: [`LightKind::Point`] carries the same bounding-sphere
//! math as a spot light so the projector and allocator treat it uniformly,
//! but C4/C5 skip point lights outright (see [`crate::producer`]).

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Spot { direction: Vec3, outer_angle: f32 },
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub range: f32,
    pub kind: LightKind,
}

/// A light's bounding sphere, per §3's invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Light {
    /// `center = position + radius·direction`, `radius = range / (2·cos(outerAngle))`
    /// for spots; `center = position, radius = range` for points. Grounded
    /// in `ShadowPoolResetPass.cpp::UpdateLightConstants`.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        match self.kind {
            LightKind::Spot {
                direction,
                outer_angle,
            } => {
                let radius = self.range / (2.0 * (outer_angle * 0.5).cos());
                BoundingSphere {
                    center: self.position + radius * direction,
                    radius,
                }
            }
            LightKind::Point => BoundingSphere {
                center: self.position,
                radius: self.range,
            },
        }
    }

    pub fn is_spot(&self) -> bool {
        matches!(self.kind, LightKind::Spot { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn point_light_sphere_is_position_and_range() {
        let light = Light {
            position: Vec3::new(1.0, 2.0, 3.0),
            range: 5.0,
            kind: LightKind::Point,
        };

        let sphere = light.bounding_sphere();
        assert_eq!(sphere.center, light.position);
        assert_eq!(sphere.radius, 5.0);
    }

    #[test]
    fn spot_light_sphere_extends_along_direction() {
        let light = Light {
            position: Vec3::ZERO,
            range: 10.0,
            kind: LightKind::Spot {
                direction: Vec3::Z,
                outer_angle: FRAC_PI_4,
            },
        };

        let sphere = light.bounding_sphere();
        let expected_radius = 10.0 / (2.0 * (FRAC_PI_4 * 0.5).cos());
        assert!((sphere.radius - expected_radius).abs() < 1e-5);
        assert!((sphere.center - Vec3::Z * expected_radius).length() < 1e-5);
    }
}
