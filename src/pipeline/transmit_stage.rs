//! Transmit stage: fragments encoded frames and puts them on the wire

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::channel::TransferChannel;
use super::stats::StageCounters;
use super::types::EncodedFrame;
use crate::net::{DatagramTransmitter, FrameFragmenter, SendOutcome};

/// The tail of the pipeline: blocks on channel B, fragments each frame and
/// hands every fragment to the transmitter.
///
/// A rejected send loses that one fragment and nothing else — there is no
/// retransmission, and the receiver is built to tolerate holes. Only a frame
/// too large for the fragment protocol is dropped whole.
pub struct TransmitStage {
    transmitter: Arc<dyn DatagramTransmitter>,
    fragmenter: FrameFragmenter,
    input: Arc<TransferChannel<EncodedFrame>>,
    running: Arc<AtomicBool>,
    counter: Arc<StageCounters>,
}

impl TransmitStage {
    pub fn new(
        transmitter: Arc<dyn DatagramTransmitter>,
        fragmenter: FrameFragmenter,
        input: Arc<TransferChannel<EncodedFrame>>,
        running: Arc<AtomicBool>,
        counter: Arc<StageCounters>,
    ) -> Self {
        Self { transmitter, fragmenter, input, running, counter }
    }

    pub fn run(self) {
        info!(
            "transmit stage running ({} byte datagrams, {} byte payloads)",
            self.fragmenter.max_packet_size(),
            self.fragmenter.payload_size()
        );
        let mut rejected = 0u64;

        while self.running.load(Ordering::Acquire) {
            let Some(frame) = self.input.wait_pop() else {
                break;
            };

            let packets = match self.fragmenter.fragment(&frame) {
                Ok(packets) => packets,
                Err(e) => {
                    error!("transmit: dropping frame: {}", e);
                    continue;
                }
            };

            for (i, packet) in packets.iter().enumerate() {
                if self.transmitter.send(packet) == SendOutcome::Rejected {
                    rejected += 1;
                    if rejected == 1 || rejected % 500 == 0 {
                        warn!(
                            "transmit: fragment {}/{} of frame {} rejected ({} rejects)",
                            i + 1,
                            packets.len(),
                            frame.frame_index,
                            rejected
                        );
                    }
                    // Skip this fragment only; the rest of the frame still
                    // carries value to the receiver.
                }
            }

            self.counter.increment();
        }

        debug!("transmit stage exiting ({} fragments rejected total)", rejected);
    }
}
