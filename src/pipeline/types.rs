//! Core types moved between pipeline stages

use bytes::Bytes;
use std::time::Instant;

/// One captured video frame.
///
/// The pixel data is NV12 (full-resolution luma plane followed by an
/// interleaved half-height chroma plane). Ownership moves from the frame
/// source into the capture stage and is consumed by the encoder; nothing
/// downstream ever sees raw pixels.
pub struct Frame {
    /// NV12 pixel data, `width * height * 3 / 2` bytes
    pub data: Bytes,

    pub width: u32,
    pub height: u32,

    /// Monotonic capture index, assigned by the frame source.
    /// Unique for the lifetime of the source, including across
    /// device re-acquisition.
    pub index: u64,

    /// Capture time in microseconds on the stream clock
    pub timestamp_us: u64,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_us", &self.timestamp_us)
            .field("size", &self.data.len())
            .finish()
    }
}

/// One encoded (H.264 Annex-B) frame, produced by the encode stage and
/// consumed by the transmit stage.
pub struct EncodedFrame {
    /// Elementary-stream bytes, owned and moved, never shared
    pub data: Bytes,

    /// Index copied from the originating [`Frame`]
    pub frame_index: u64,

    /// Timestamp of the originating frame, microseconds on the stream
    /// clock; the low 32 bits go on the wire
    pub timestamp_us: u64,
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedFrame")
            .field("frame_index", &self.frame_index)
            .field("timestamp_us", &self.timestamp_us)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Monotonic clock shared by all stages of one pipeline run.
///
/// Anchored at pipeline start; all frame timestamps are microseconds since
/// this base, so a receiver can difference them without caring about the
/// sender's wall clock.
#[derive(Clone, Copy)]
pub struct StreamClock {
    base: Instant,
}

impl StreamClock {
    pub fn start() -> Self {
        Self { base: Instant::now() }
    }

    /// Microseconds elapsed since the clock was started
    pub fn now_micros(&self) -> u64 {
        self.base.elapsed().as_micros() as u64
    }
}

impl std::fmt::Debug for StreamClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClock")
            .field("elapsed", &self.base.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn clock_is_monotonic() {
        let clock = StreamClock::start();
        let a = clock.now_micros();
        thread::sleep(Duration::from_millis(5));
        let b = clock.now_micros();
        assert!(b > a, "clock went backwards: {} -> {}", a, b);
    }

    #[test]
    fn clock_copies_share_the_base() {
        let clock = StreamClock::start();
        let copy = clock;
        thread::sleep(Duration::from_millis(5));
        let a = clock.now_micros();
        let b = copy.now_micros();
        // Both read the same base; readings taken back-to-back stay close.
        assert!(a.abs_diff(b) < 5_000);
    }
}
