//! Frame source collaborator seam
//!
//! Real devices (desktop duplication, V4L2, camera stacks) live behind
//! [`FrameSource`]; the pipeline only ever sees the three-way capture result
//! and the re-acquisition hook. The in-tree [`PatternSource`] keeps the
//! binary runnable on machines without a capturable device and feeds the
//! pipeline tests.

pub mod pattern;

pub use pattern::PatternSource;

use crate::pipeline::types::Frame;

/// Result of one capture attempt.
pub enum CaptureEvent {
    /// A frame was produced; ownership moves to the caller
    Frame(Frame),

    /// Nothing new on the device yet; poll again shortly
    NoFrameYet,

    /// Access to the device was lost; [`FrameSource::reacquire`] may bring
    /// it back without restarting the pipeline
    DeviceLost,
}

/// Video source collaborator.
///
/// A source assigns every produced frame a monotonically increasing index
/// that is never reused, including across [`reacquire`](Self::reacquire) —
/// the receiver relies on indices only moving forward.
pub trait FrameSource: Send {
    /// Attempt to capture one frame. Must not block beyond a short internal
    /// device timeout.
    fn try_capture(&mut self) -> CaptureEvent;

    /// Re-open the underlying device after [`CaptureEvent::DeviceLost`].
    fn reacquire(&mut self) -> anyhow::Result<()>;
}
