//! Error kinds, per §7.
//!
//! Recoverable conditions (empty level-change set, a ring slot still busy,
//! an unsignaled event, starvation, a failed tile) are never represented as
//! `Err`, they're plain data the coordinator observes and acts on next
//! tick. Only the fatal conditions of §7 surface as [`FatalError`], and only
//! at the single callback boundary described there.

use thiserror::Error;

/// Conditions that halt the coordinator permanently. The core never panics
/// or throws across the frame boundary for these; it records the error and
/// reports it once via the host's fatal callback (see [`crate::coordinator`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FatalError {
    /// The graphics device was lost (TDR, driver reset, surface gone).
    #[error("graphics device lost")]
    DeviceLost,

    /// A ring frame's event query never signaled within the backend's
    /// patience; the GPU is presumed hung.
    #[error("frame {0} event never signaled")]
    EventNeverSignaled(usize),

    /// Counter readback reported a size larger than the buffer it is meant
    /// to describe, the two are supposed to agree by construction (§8).
    #[error("counter readback inconsistent with buffer size: counted {counted}, capacity {capacity}")]
    ReadbackInconsistent { counted: u64, capacity: u64 },
}

pub type FatalResult<T> = Result<T, FatalError>;
