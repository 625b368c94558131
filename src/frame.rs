//! C8: frame ring state.
//!
//! Generalizes `rendinator`'s `PerFrame<T>`/`FrameIndex` (`src/frame.rs`,
//! a compile-time `FRAMES_IN_FLIGHT`-sized array) to a runtime
//! `Config::ring_depth`-sized ring, since this crate's ring depth is a
//! tunable, not a constant baked in at compile time.
//!
//! Replaces the original's single `frameInUse` boolean
//! (`ShadowPoolResetPass.cpp::BufferReadBack`) with an explicit state
//! enum. A bool only distinguishes "busy" from "idle"; recording and
//! consuming are distinct busy states with different legal next actions
//! (a frame mid-recording can't be polled, a frame awaiting consume can't
//! be re-recorded), and `RingState` makes that a type-level fact instead
//! of something the caller has to remember.

use crate::emitter::SlotCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    /// Available to start recording a new frame's shadow-pool work into.
    Free,
    /// The CPU is actively building this frame's command list.
    Recording,
    /// Submitted to the device; waiting on its event query to signal.
    Submitted,
    /// Signaled and read back this tick; about to be released to `Free`.
    Consumed,
}

/// One light's shadow-pool work recorded into a ring frame, carried from
/// the recording step to the consume step once its counters are known
/// good.
#[derive(Debug, Clone)]
pub struct PendingLight {
    pub light_index: u32,
    pub slot: u32,
    pub counters: SlotCounters,
    pub template_nodes: Vec<crate::quadtree::TemplateNode>,
    pub template_codebook: Vec<crate::quadtree::CompressionModel>,
}

/// One slot of the frame ring: the event query gating its readback, the
/// staging buffer the counters were copied into, and the per-light work
/// recorded against it.
pub struct RingFrame<Q> {
    pub state: RingState,
    pub event: Q,
    pub counters_buffer: crate::gfx::BufferHandle,
    pub pending: Vec<PendingLight>,
}

/// Runtime-sized ring of `config.ring_depth` frames, with the same
/// two-cursor discipline as `ShadowPoolResetPass`'s
/// `writeFrameIndex`/`readFrameIndex`: `write` always refers to the next
/// frame eligible to start recording, `read` to the next eligible to be
/// consumed. Unlike `PerFrame<T>`, indexing wraps at a runtime-known
/// `ring_depth` rather than a const generic.
pub struct FrameRing<Q> {
    frames: Vec<RingFrame<Q>>,
    write: usize,
    read: usize,
}

impl<Q> FrameRing<Q> {
    pub fn new(ring_depth: usize, mut make_frame: impl FnMut() -> RingFrame<Q>) -> Self {
        assert!(ring_depth > 0, "ring depth must be at least 1");
        Self {
            frames: (0..ring_depth).map(|_| make_frame()).collect(),
            write: 0,
            read: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn write_index(&self) -> usize {
        self.write
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_frame(&self) -> &RingFrame<Q> {
        &self.frames[self.write]
    }

    pub fn write_frame_mut(&mut self) -> &mut RingFrame<Q> {
        &mut self.frames[self.write]
    }

    pub fn read_frame(&self) -> &RingFrame<Q> {
        &self.frames[self.read]
    }

    pub fn read_frame_mut(&mut self) -> &mut RingFrame<Q> {
        &mut self.frames[self.read]
    }

    pub fn advance_write(&mut self) {
        self.write = (self.write + 1) % self.frames.len();
    }

    pub fn advance_read(&mut self) {
        self.read = (self.read + 1) % self.frames.len();
    }

    /// §5's invariant: at most one frame `Recording`, at most one
    /// `Submitted` awaiting consume per slot, `write - read` bounded by the
    /// ring depth. Exposed for tests; the coordinator never needs to call
    /// this itself since the state machine can't reach a violating state
    /// by construction.
    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.state == RingState::Submitted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(state: RingState) -> RingFrame<()> {
        RingFrame {
            state,
            event: (),
            counters_buffer: crate::gfx::BufferHandle(0),
            pending: Vec::new(),
        }
    }

    #[test]
    fn cursors_wrap_independently() {
        let mut ring = FrameRing::new(3, || frame(RingState::Free));
        ring.advance_write();
        ring.advance_write();
        ring.advance_write();
        assert_eq!(ring.write_index(), 0);

        ring.advance_read();
        assert_eq!(ring.read_index(), 1);
    }

    #[test]
    fn in_flight_count_tracks_submitted_frames() {
        let mut ring = FrameRing::new(3, || frame(RingState::Free));
        ring.write_frame_mut().state = RingState::Submitted;
        assert_eq!(ring.in_flight_count(), 1);
    }
}
