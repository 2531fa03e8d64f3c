//! Synthetic NV12 test-pattern source

use bytes::Bytes;
use log::info;

use super::{CaptureEvent, FrameSource};
use crate::pipeline::types::{Frame, StreamClock};

/// Generates a scrolling luma gradient with a slowly cycling chroma wash.
///
/// Every call to [`try_capture`](FrameSource::try_capture) yields a frame,
/// so the pipeline's pacing alone decides the capture rate. Indices keep
/// counting across `reacquire`, matching the contract real device sources
/// must honor.
pub struct PatternSource {
    width: u32,
    height: u32,
    clock: StreamClock,
    next_index: u64,
    phase: u8,
}

impl PatternSource {
    pub fn new(width: u32, height: u32, clock: StreamClock) -> Self {
        info!("pattern source: {}x{} synthetic NV12", width, height);
        Self {
            width,
            height,
            clock,
            next_index: 0,
            phase: 0,
        }
    }

    fn render(&self) -> Bytes {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut data = vec![0u8; w * h + w * h / 2];

        // Luma: diagonal gradient scrolled by the frame phase.
        let (luma, chroma) = data.split_at_mut(w * h);
        for (y, row) in luma.chunks_exact_mut(w).enumerate() {
            let base = y as u8;
            for (x, px) in row.iter_mut().enumerate() {
                *px = base.wrapping_add(x as u8).wrapping_add(self.phase);
            }
        }

        // Chroma: neutral grey drifting with the phase, interleaved U/V.
        let u = 128u8.wrapping_add(self.phase / 2);
        let v = 128u8.wrapping_sub(self.phase / 2);
        for pair in chroma.chunks_exact_mut(2) {
            pair[0] = u;
            pair[1] = v;
        }

        Bytes::from(data)
    }
}

impl FrameSource for PatternSource {
    fn try_capture(&mut self) -> CaptureEvent {
        let frame = Frame {
            data: self.render(),
            width: self.width,
            height: self.height,
            index: self.next_index,
            timestamp_us: self.clock.now_micros(),
        };
        self.next_index += 1;
        self.phase = self.phase.wrapping_add(1);
        CaptureEvent::Frame(frame)
    }

    fn reacquire(&mut self) -> anyhow::Result<()> {
        // Nothing to re-open; reset the pattern but never the index counter.
        self.phase = 0;
        info!("pattern source: reacquired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_index(source: &mut PatternSource) -> u64 {
        match source.try_capture() {
            CaptureEvent::Frame(f) => f.index,
            _ => panic!("pattern source must always produce a frame"),
        }
    }

    #[test]
    fn frames_have_nv12_size_and_increasing_indices() {
        let mut source = PatternSource::new(64, 48, StreamClock::start());

        let CaptureEvent::Frame(frame) = source.try_capture() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.data.len(), 64 * 48 * 3 / 2);
        assert_eq!(frame.index, 0);

        assert_eq!(capture_index(&mut source), 1);
        assert_eq!(capture_index(&mut source), 2);
    }

    #[test]
    fn indices_survive_reacquire() {
        let mut source = PatternSource::new(32, 32, StreamClock::start());
        let before = capture_index(&mut source);

        source.reacquire().unwrap();

        let after = capture_index(&mut source);
        assert_eq!(after, before + 1);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = PatternSource::new(32, 32, StreamClock::start());
        let CaptureEvent::Frame(a) = source.try_capture() else { panic!() };
        let CaptureEvent::Frame(b) = source.try_capture() else { panic!() };
        assert_ne!(a.data, b.data, "pattern must animate between frames");
    }
}
