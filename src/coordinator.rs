//! C8: frame ring coordinator.
//!
//! Orchestrates C2-C7 per §4.8's two-step protocol: a recording step that
//! runs projection/allocation/tile-build and stages results behind a
//! non-blocking GPU submission, and a consume step that polls the oldest
//! outstanding frame and, once its counters are known good, emits the
//! final per-slot buffers. Grounded directly in
//! `ShadowPoolResetPass.cpp::ComputeShadowPoolSlot`, which runs exactly
//! this shape every call: "if the write slot is free, record and submit
//! it" followed by "if the read slot is done, consume it", two
//! independent `if`s, not a single conditional, so a frame can be
//! recorded and an older one consumed in the same tick.
//!
//! Rasterizing scene geometry into a light's depth buffer (C4's actual
//! draw calls) is outside this crate's reach without a mesh/material
//! pipeline to drive it; [`DepthSource`] is the seam the host fills in,
//! the same way the original's `Inputs` struct hands `ShadowMapGenerationPass`
//! a depth buffer it already rendered into.

use std::rc::Rc;

use crate::allocator::SlotAllocator;
use crate::atlas::AtlasGeometry;
use crate::config::Config;
use crate::emitter::{self, FinalBuffers, SlotCounters};
use crate::error::{FatalError, FatalResult};
use crate::frame::{FrameRing, PendingLight, RingFrame, RingState};
use crate::gfx::{BufferDesc, CommandList, GraphicsDevice};
use crate::light::Light;
use crate::producer::{self, ShadowPassTarget};
use crate::projector::{self, Desired, View};
use crate::quadtree::CodewordTable;
use crate::slot::Placement;
use crate::tile_builder::{self, TileOutcome};

/// Host-supplied renderer for a single light's shadow-depth pass. Returns
/// a `resolution x resolution` row-major depth buffer in the producer's
/// reversed-Z convention.
pub trait DepthSource {
    fn render_depth(&mut self, target: &ShadowPassTarget) -> Vec<f32>;
}

/// Per-light result the coordinator exposes once a frame has been
/// consumed: the slot it ended up in and the final buffers C7 samples
/// against.
#[derive(Debug, Clone)]
pub struct LightResult {
    pub slot: u32,
    pub buffers: FinalBuffers,
}

pub struct Coordinator<D: GraphicsDevice> {
    config: Config,
    geometry: Rc<AtlasGeometry>,
    allocator: SlotAllocator,
    placement: Placement,
    ring: FrameRing<D::EventQuery>,
    /// The most recent final buffers per light, carried forward frame to
    /// frame so a light that wasn't level-changed this tick still has
    /// something for C7 to sample against (§4.8's "copy prior-frame
    /// buffers for unchanged lights").
    results: Vec<Option<LightResult>>,
}

impl<D: GraphicsDevice> Coordinator<D> {
    pub fn new(config: Config, light_count: usize, device: &D) -> Self {
        let geometry = Rc::new(AtlasGeometry::new(&config));
        let allocator = SlotAllocator::new(Rc::clone(&geometry));
        let placement = Placement::new(light_count);

        let ring = FrameRing::new(config.ring_depth, || RingFrame {
            state: RingState::Free,
            event: device.create_event_query(),
            counters_buffer: device.create_buffer(BufferDesc {
                size: std::mem::size_of::<SlotCounters>() as u64,
                cpu_readable: true,
                label: "shadow-pool-counters-readback",
            }),
            pending: Vec::new(),
        });

        Self {
            config,
            geometry,
            allocator,
            placement,
            ring,
            results: (0..light_count).map(|_| None).collect(),
        }
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn result(&self, light_index: usize) -> Option<&LightResult> {
        self.results[light_index].as_ref()
    }

    /// Run one tick: record a new frame if the write slot is free, then
    /// consume the oldest outstanding frame if its event query has
    /// signaled. Two independent checks, exactly as
    /// `ComputeShadowPoolSlot` runs them, a frame can be recorded and a
    /// different, older one consumed in the same tick.
    pub fn tick(
        &mut self,
        lights: &[Light],
        view: &View,
        device: &D,
        depth_source: &mut impl DepthSource,
    ) -> FatalResult<()> {
        self.record(lights, view, device, depth_source)?;
        self.consume(device)?;
        Ok(())
    }

    fn record(
        &mut self,
        lights: &[Light],
        view: &View,
        device: &D,
        depth_source: &mut impl DepthSource,
    ) -> FatalResult<()> {
        if self.ring.write_frame().state != RingState::Free {
            return Ok(());
        }

        let desired: Vec<Desired> = lights
            .iter()
            .map(|light| projector::project(light.bounding_sphere(), view, &self.geometry, &self.config))
            .collect();

        let update = self.allocator.place(&desired, &mut self.placement);

        // §7: an empty level-change set skips Recording entirely, leaving
        // the write slot Free so a ring slot isn't burned on a trivial
        // submit/consume round trip when there's nothing new to build.
        if update.level_changed.is_empty() {
            return Ok(());
        }

        self.ring.write_frame_mut().state = RingState::Recording;

        let mut commands = device.create_command_list();
        commands.begin_marker("shadow-pool-tile-build");

        let mut pending = Vec::new();
        let mut aggregate = SlotCounters::default();

        for &light_index in &update.level_changed {
            let slot = match self.placement.get(light_index as usize) {
                Some(slot) => slot,
                None => continue,
            };
            let level = self.geometry.level_of(slot);
            let light = &lights[light_index as usize];

            let Some(target) = producer::shadow_pass_target(light_index, light, level, &self.geometry, &self.config)
            else {
                continue;
            };

            let depth = depth_source.render_depth(&target);
            let mut codewords = CodewordTable::new(&self.config);

            let TileOutcome::Built(result) =
                tile_builder::build_tile(&depth, target.resolution, &mut codewords, &self.config)
            else {
                // §7: a failed tile is a normal outcome, not fatal. The
                // light keeps its previous frame's buffers this tick.
                continue;
            };

            let counters = SlotCounters {
                codebook_count: codewords.len() as u32,
                quadtree_count: result.nodes.len() as u32 - 1,
                tile_count: 1,
            };
            aggregate.codebook_count += counters.codebook_count;
            aggregate.quadtree_count += counters.quadtree_count;
            aggregate.tile_count += counters.tile_count;

            pending.push(PendingLight {
                light_index,
                slot,
                counters,
                template_nodes: result.nodes,
                template_codebook: codewords.codebook().to_vec(),
            });
        }

        let frame = self.ring.write_frame();
        let counters_bytes = bytemuck::bytes_of(&aggregate);
        commands.write_buffer(frame.counters_buffer, 0, counters_bytes);
        commands.end_marker();

        let frame = self.ring.write_frame_mut();
        frame.pending = pending;
        frame.state = RingState::Submitted;

        device.reset_event_query(&frame.event);
        device.execute(commands, &frame.event);

        self.ring.advance_write();
        Ok(())
    }

    fn consume(&mut self, device: &D) -> FatalResult<()> {
        if self.ring.read_frame().state != RingState::Submitted {
            return Ok(());
        }

        if !device.poll_event_query(&self.ring.read_frame().event) {
            return Ok(());
        }

        self.ring.read_frame_mut().state = RingState::Consumed;

        let frame = self.ring.read_frame();
        let readback = device.map_buffer_read(frame.counters_buffer);
        let readback_counters: SlotCounters = *bytemuck::from_bytes(&readback);

        let expected: u32 = frame.pending.iter().map(|p| p.counters.codebook_count).sum();
        if readback_counters.codebook_count != expected {
            return Err(FatalError::ReadbackInconsistent {
                counted: readback_counters.codebook_count as u64,
                capacity: expected as u64,
            });
        }

        for pending in &self.ring.read_frame().pending {
            let buffers = emitter::emit(&pending.template_nodes, &pending.template_codebook);
            self.results[pending.light_index as usize] = Some(LightResult {
                slot: pending.slot,
                buffers,
            });
        }

        let frame = self.ring.read_frame_mut();
        frame.pending.clear();
        frame.state = RingState::Free;
        device.reset_event_query(&frame.event);

        self.ring.advance_read();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::fake::FakeDevice;
    use crate::light::LightKind;
    use crate::projector::view_from_camera;
    use glam::{Mat4, UVec2, Vec3};

    struct FlatDepth(f32);

    impl DepthSource for FlatDepth {
        fn render_depth(&mut self, target: &ShadowPassTarget) -> Vec<f32> {
            vec![self.0; (target.resolution * target.resolution) as usize]
        }
    }

    fn test_view() -> View {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 100.0);
        view_from_camera(Vec3::ZERO, Vec3::Z, Vec3::Y, proj, UVec2::new(1080, 1080), 0.1)
    }

    fn close_light() -> Light {
        Light {
            position: Vec3::new(0.0, 0.0, 5.0),
            range: 10.0,
            kind: LightKind::Spot {
                direction: Vec3::Z,
                outer_angle: std::f32::consts::FRAC_PI_4,
            },
        }
    }

    #[test]
    fn a_placed_light_gets_final_buffers_after_two_ticks() {
        let config = Config {
            ring_depth: 2,
            tile_width: 32,
            tile_height: 32,
            ..Config::default()
        };
        let device = FakeDevice::new();
        let lights = vec![close_light()];
        let view = test_view();
        let mut coordinator = Coordinator::new(config, lights.len(), &device);
        let mut depth_source = FlatDepth(0.3);

        // The fake device signals its event query the instant `execute`
        // runs, so one tick's consume step already sees the frame it just
        // recorded as done; a second tick just confirms the result is
        // stable once there's nothing new to level-change.
        coordinator.tick(&lights, &view, &device, &mut depth_source).unwrap();
        coordinator.tick(&lights, &view, &device, &mut depth_source).unwrap();

        let result = coordinator.result(0).expect("light should have a result by now");
        assert_eq!(coordinator.placement().get(0), Some(result.slot));
        assert!(!result.buffers.nodes.is_empty());
    }

    #[test]
    fn unplaced_light_never_gets_a_result() {
        let config = Config::default();
        let device = FakeDevice::new();
        let lights = vec![Light {
            position: Vec3::new(0.0, 0.0, 1_000_000.0),
            range: 0.001,
            kind: LightKind::Point,
        }];
        let view = test_view();
        let mut coordinator = Coordinator::new(config, lights.len(), &device);
        let mut depth_source = FlatDepth(0.5);

        for _ in 0..4 {
            coordinator.tick(&lights, &view, &device, &mut depth_source).unwrap();
        }

        assert!(coordinator.placement().get(0).is_none());
        assert!(coordinator.result(0).is_none());
    }

    #[test]
    fn ring_state_returns_to_free_after_consume() {
        let config = Config {
            ring_depth: 1,
            ..Config::default()
        };
        let device = FakeDevice::new();
        let lights = vec![close_light()];
        let view = test_view();
        let mut coordinator = Coordinator::new(config, lights.len(), &device);
        let mut depth_source = FlatDepth(0.2);

        coordinator.tick(&lights, &view, &device, &mut depth_source).unwrap();
        assert_eq!(coordinator.ring.read_frame().state, RingState::Free);
    }
}
