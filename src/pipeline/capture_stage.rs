//! Capture stage: polls the frame source and feeds channel A

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::channel::{PushOutcome, TransferChannel};
use super::stats::StageCounters;
use super::types::Frame;
use crate::capture::{CaptureEvent, FrameSource};

/// How long to back off when the device has nothing new, and between
/// re-acquisition attempts after a device loss.
const POLL_QUANTUM: Duration = Duration::from_micros(100);

/// The producer end of the pipeline.
///
/// Never blocks: an empty device means a sub-millisecond nap and another
/// poll, a lost device means re-acquiring in place. The stage itself only
/// exits when the running flag drops.
pub struct CaptureStage {
    source: Box<dyn FrameSource>,
    output: Arc<TransferChannel<Frame>>,
    running: Arc<AtomicBool>,
    counter: Arc<StageCounters>,
    frame_interval: Duration,
}

impl CaptureStage {
    pub fn new(
        source: Box<dyn FrameSource>,
        output: Arc<TransferChannel<Frame>>,
        running: Arc<AtomicBool>,
        counter: Arc<StageCounters>,
        frame_rate: u32,
    ) -> Self {
        Self {
            source,
            output,
            running,
            counter,
            frame_interval: Duration::from_micros(1_000_000 / frame_rate.max(1) as u64),
        }
    }

    pub fn run(mut self) {
        info!("capture stage running ({:?} frame interval)", self.frame_interval);
        let mut evictions = 0u64;

        while self.running.load(Ordering::Acquire) {
            let attempt_started = Instant::now();

            match self.source.try_capture() {
                CaptureEvent::Frame(frame) => {
                    if self.output.push(frame) == PushOutcome::PushedEvictingOldest {
                        evictions += 1;
                        if evictions == 1 || evictions % 200 == 0 {
                            warn!("capture: encoder falling behind, {} frames evicted", evictions);
                        }
                    }
                    self.counter.increment();

                    // Pace to the target rate, measured from the start of
                    // the attempt so capture cost eats into the interval.
                    if let Some(remaining) =
                        self.frame_interval.checked_sub(attempt_started.elapsed())
                    {
                        thread::sleep(remaining);
                    }
                }
                CaptureEvent::NoFrameYet => thread::sleep(POLL_QUANTUM),
                CaptureEvent::DeviceLost => {
                    warn!("capture: device lost, re-acquiring");
                    match self.source.reacquire() {
                        Ok(()) => info!("capture: device re-acquired"),
                        Err(e) => {
                            warn!("capture: re-acquisition failed, will retry: {:#}", e);
                            thread::sleep(POLL_QUANTUM);
                        }
                    }
                }
            }
        }

        debug!("capture stage exiting ({} evictions total)", evictions);
    }
}
