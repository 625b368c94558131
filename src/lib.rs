//! GPU shadow-atlas coordinator: places lights into a shared atlas of
//! fixed-size slots, compresses each light's rendered depth into a
//! per-light quadtree of planar/depth codewords, and reconstructs depth
//! at sample time by walking that tree, all pipelined across a frame
//! ring so the allocator's readback never stalls the graphics queue.
//!
//! Modules map directly onto the eight components of the pipeline:
//! [`atlas`] (C1, slot/level geometry), [`light`] and [`projector`] (C2,
//! bounding spheres and desired-level projection), [`slot`] and
//! [`allocator`] (C3, the free-list placement pass), [`producer`] (C4,
//! shadow-pass view/projection setup), [`tile_builder`] (C5, the
//! quadtree build), [`emitter`] (C6, BFS compaction into final buffers),
//! [`sampler`] (C7, reconstruction), and [`frame`]/[`coordinator`] (C8,
//! the frame ring). [`gfx`] is the capability-trait seam every
//! GPU-touching component is written against; [`config`] and [`error`]
//! are shared across all of them.

pub mod allocator;
pub mod atlas;
pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod gfx;
pub mod light;
pub mod producer;
pub mod projector;
pub mod quadtree;
pub mod sampler;
pub mod slot;
pub mod tile_builder;

pub use atlas::{AtlasGeometry, Level, SlotId};
pub use config::Config;
pub use coordinator::{Coordinator, DepthSource, LightResult};
pub use error::{FatalError, FatalResult};
pub use light::{BoundingSphere, Light, LightKind};
