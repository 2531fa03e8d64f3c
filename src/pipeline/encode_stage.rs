//! Encode stage: drains channel A through the encoder into channel B

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::channel::TransferChannel;
use super::stats::StageCounters;
use super::types::{EncodedFrame, Frame};
use crate::encoder::FrameEncoder;

/// The middle of the pipeline: blocks on channel A, runs the encoder, feeds
/// channel B. An encode failure costs exactly one frame.
pub struct EncodeStage {
    encoder: Box<dyn FrameEncoder>,
    input: Arc<TransferChannel<Frame>>,
    output: Arc<TransferChannel<EncodedFrame>>,
    running: Arc<AtomicBool>,
    counter: Arc<StageCounters>,
}

impl EncodeStage {
    pub fn new(
        encoder: Box<dyn FrameEncoder>,
        input: Arc<TransferChannel<Frame>>,
        output: Arc<TransferChannel<EncodedFrame>>,
        running: Arc<AtomicBool>,
        counter: Arc<StageCounters>,
    ) -> Self {
        Self { encoder, input, output, running, counter }
    }

    pub fn run(mut self) {
        info!("encode stage running");
        let mut failures = 0u64;

        while self.running.load(Ordering::Acquire) {
            // Blocks until a frame arrives; channel cancellation wakes us
            // for shutdown.
            let Some(frame) = self.input.wait_pop() else {
                break;
            };

            let index = frame.index;
            match self.encoder.encode(frame) {
                Ok(encoded) => {
                    self.output.push(encoded);
                    self.counter.increment();
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 || failures % 100 == 0 {
                        warn!("encode: frame {} dropped ({} failures): {:#}", index, failures, e);
                    }
                }
            }
        }

        debug!("encode stage exiting ({} failures total)", failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use bytes::Bytes;
    use std::thread;
    use std::time::Duration;

    /// Wraps each frame's bytes unchanged; fails on demand.
    struct PassthroughEncoder {
        fail_on_index: Option<u64>,
    }

    impl FrameEncoder for PassthroughEncoder {
        fn encode(&mut self, frame: Frame) -> anyhow::Result<EncodedFrame> {
            if self.fail_on_index == Some(frame.index) {
                return Err(anyhow!("scripted failure"));
            }
            Ok(EncodedFrame {
                data: frame.data,
                frame_index: frame.index,
                timestamp_us: frame.timestamp_us,
            })
        }
    }

    fn frame(index: u64) -> Frame {
        Frame {
            data: Bytes::from(vec![index as u8; 8]),
            width: 4,
            height: 1,
            index,
            timestamp_us: index,
        }
    }

    fn run_stage(
        encoder: PassthroughEncoder,
        frames: Vec<Frame>,
    ) -> Vec<u64> {
        let input = Arc::new(TransferChannel::new(16));
        let output = Arc::new(TransferChannel::new(16));
        let running = Arc::new(AtomicBool::new(true));

        for f in frames {
            input.push(f);
        }

        let stage = EncodeStage::new(
            Box::new(encoder),
            input.clone(),
            output.clone(),
            running.clone(),
            Arc::new(StageCounters::new()),
        );
        let stage_thread = thread::spawn(move || stage.run());

        thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Release);
        input.cancel();
        stage_thread.join().unwrap();

        let mut indices = Vec::new();
        while let Some(e) = output.try_pop() {
            indices.push(e.frame_index);
        }
        indices
    }

    #[test]
    fn frames_pass_through_in_order() {
        let encoded = run_stage(
            PassthroughEncoder { fail_on_index: None },
            vec![frame(0), frame(1), frame(2)],
        );
        assert_eq!(encoded, vec![0, 1, 2]);
    }

    #[test]
    fn encode_failure_drops_one_frame_and_continues() {
        let encoded = run_stage(
            PassthroughEncoder { fail_on_index: Some(1) },
            vec![frame(0), frame(1), frame(2), frame(3)],
        );
        assert_eq!(encoded, vec![0, 2, 3]);
    }

    #[test]
    fn cancellation_unblocks_an_idle_stage() {
        let input: Arc<TransferChannel<Frame>> = Arc::new(TransferChannel::new(4));
        let output = Arc::new(TransferChannel::new(4));
        let running = Arc::new(AtomicBool::new(true));

        let stage = EncodeStage::new(
            Box::new(PassthroughEncoder { fail_on_index: None }),
            input.clone(),
            output,
            running.clone(),
            Arc::new(StageCounters::new()),
        );
        let stage_thread = thread::spawn(move || stage.run());

        // The stage is blocked in wait_pop with nothing queued; cancelling
        // the channel must be enough to let it exit.
        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Release);
        input.cancel();

        stage_thread.join().unwrap();
    }
}
