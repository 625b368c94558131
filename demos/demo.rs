//! Headless walkthrough of the coordinator: a handful of lights orbiting
//! the origin, a flat-depth stand-in for a real shadow pass, and a few
//! ticks of the frame ring so the placement settles. Uses [`FakeDevice`]
//! rather than a real surface, the same way `rendinator`'s own binary
//! (`src/main.rs`) sets up `env_logger` before touching the device.

use glam::{Mat4, UVec2, Vec3};
use shadow_atlas::coordinator::DepthSource;
use shadow_atlas::gfx::fake::FakeDevice;
use shadow_atlas::light::LightKind;
use shadow_atlas::projector::view_from_camera;
use shadow_atlas::{Config, Coordinator, Light};

struct FlatDepth;

impl DepthSource for FlatDepth {
    fn render_depth(&mut self, target: &shadow_atlas::producer::ShadowPassTarget) -> Vec<f32> {
        vec![0.5; (target.resolution * target.resolution) as usize]
    }
}

fn scene_lights() -> Vec<Light> {
    let count = 6;
    (0..count)
        .map(|i| {
            let angle = (i as f32 / count as f32) * std::f32::consts::TAU;
            let position = Vec3::new(angle.cos() * 8.0, 2.0, angle.sin() * 8.0);
            Light {
                position,
                range: 12.0,
                kind: LightKind::Spot {
                    direction: -position.normalize(),
                    outer_angle: std::f32::consts::FRAC_PI_4,
                },
            }
        })
        .collect()
}

fn main() {
    env_logger::init();

    let config = Config::default();
    let lights = scene_lights();
    let device = FakeDevice::new();
    let mut coordinator = Coordinator::new(config, lights.len(), &device);
    let mut depth_source = FlatDepth;

    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0);
    let view = view_from_camera(Vec3::new(0.0, 4.0, 16.0), Vec3::ZERO, Vec3::Y, proj, UVec2::new(1920, 1080), 0.1);

    for tick in 0..config.ring_depth + 2 {
        coordinator.tick(&lights, &view, &device, &mut depth_source).expect("tick should not hit a fatal readback error");

        log::info!("tick {tick}");
        for (index, _light) in lights.iter().enumerate() {
            match coordinator.placement().get(index) {
                Some(slot) => log::info!("  light {index} -> slot {slot}"),
                None => log::info!("  light {index} unplaced"),
            }
        }
    }

    for (index, _light) in lights.iter().enumerate() {
        match coordinator.result(index) {
            Some(result) => log::info!("light {index} final: slot {} with {} codebook entries", result.slot, result.buffers.codebook.len()),
            None => log::info!("light {index} has no buffers yet"),
        }
    }
}
