//! Graphics capability traits.
//!
//! The coordinator and the compute/render passes (C4-C7) are written
//! against these traits only, no module outside `gfx` names a concrete
//! graphics API, matching the abstraction requirement over the capability
//! list. The trait split mirrors `rendinator`'s own
//! `Device` / `CommandBuffer` / `CommandRecorder` separation in
//! `src/core.rs` and `src/command.rs`, generalized from "the one wgpu API
//! it links against" to "any API a backend wants to provide", and the
//! method names are lifted from the calls the original makes into its RHI
//! (`writeBuffer`, `clearBufferUInt`, `copyBuffer`, `dispatch`,
//! `setComputeState`, `beginMarker`/`endMarker`, `setEventQuery`/
//! `pollEventQuery`, `mapBuffer`/`unmapBuffer`) in
//! `ShadowPoolResetPass.cpp` and `ShadowMapGenerationPass.cpp`.

pub mod fake;
pub mod wgpu_backend;

/// An opaque handle to a GPU buffer, scoped to one [`GraphicsDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// An opaque handle to a compute pipeline created from a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u32);

/// An opaque handle to a bindless descriptor slot, per §6's descriptor
/// table capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorIndex(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    pub size: u64,
    pub cpu_readable: bool,
    pub label: &'static str,
}

/// A device capable of creating resources and submitting command lists,
/// and of tracking GPU/CPU synchronization via event queries. The
/// `EventQuery` capability is what lets the frame ring coordinator (C8)
/// poll "is this frame's GPU work done yet" without blocking, exactly as
/// `pollEventQuery` does in the original.
pub trait GraphicsDevice {
    type CommandList: CommandList;
    type EventQuery: EventQuery;

    fn create_buffer(&self, desc: BufferDesc) -> BufferHandle;

    fn create_command_list(&self) -> Self::CommandList;

    fn create_event_query(&self) -> Self::EventQuery;

    /// Submit a closed command list for execution, signalling `query` once
    /// the GPU has finished, the fence-like half of §5's
    /// readback-never-stalls invariant.
    fn execute(&self, commands: Self::CommandList, query: &Self::EventQuery);

    /// Non-blocking poll: has the GPU work signalled by `query` completed?
    fn poll_event_query(&self, query: &Self::EventQuery) -> bool;

    fn reset_event_query(&self, query: &Self::EventQuery);

    /// Map a CPU-readable buffer and copy its contents out. Returning an
    /// owned copy (rather than a borrowed mapped slice) keeps the trait
    /// object-safe and avoids tying the returned data's lifetime to the
    /// backend's internal mapping state, at the cost of one copy per
    /// readback, cheap next to the GPU round trip it follows.
    fn map_buffer_read(&self, buffer: BufferHandle) -> Vec<u8>;
}

/// A recorded, not-yet-submitted sequence of GPU commands. Mirrors the
/// teacher's `CommandBuffer`/`CommandRecorder` split, but collapsed to one
/// trait since every method here is already scoped to "things recorded
/// while the list is open".
pub trait CommandList {
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn clear_buffer_u32(&mut self, buffer: BufferHandle, value: u32);

    fn copy_buffer(
        &mut self,
        dst: BufferHandle,
        dst_offset: u64,
        src: BufferHandle,
        src_offset: u64,
        size: u64,
    );

    fn dispatch(&mut self, pipeline: PipelineHandle, groups: [u32; 3]);

    fn begin_marker(&mut self, label: &str);

    fn end_marker(&mut self);
}

/// An in-flight GPU/CPU synchronization point, opaque to callers.
pub trait EventQuery {}

/// Allocates/frees bindless descriptor slots for the per-slot quadtree,
/// codebook, and reconstruction-texture arenas (§6, §9's "bindless for
/// quadtree/codebook/reconstruction texture arrays").
pub trait DescriptorTable {
    fn allocate(&mut self, buffer: BufferHandle) -> DescriptorIndex;

    fn free(&mut self, index: DescriptorIndex);
}

/// Compiles shader sources into pipelines the device can dispatch. Kept
/// separate from `GraphicsDevice` because shader compilation (preprocessing
/// via `naga_oil`, specialization constants) is a strictly CPU-side
/// concern the fake backend can stub out trivially.
pub trait ShaderFactory {
    fn compile_compute(&self, source: &str, entry_point: &str) -> PipelineHandle;
}
