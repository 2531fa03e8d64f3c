//! Pipeline orchestrator
//!
//! Owns the three stage threads and the two channels between them, drives
//! the Idle → Starting → Running → Stopping → Idle lifecycle, and aggregates
//! throughput stats. Collaborators come up in dependency order during
//! `start` and are torn down on `stop`; a failure anywhere in `start` leaves
//! the pipeline Idle with nothing leaked.

use anyhow::{bail, Context};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::capture_stage::CaptureStage;
use super::channel::TransferChannel;
use super::encode_stage::EncodeStage;
use super::stage::{spawn_stage, SchedulingHint};
use super::state::PipelineState;
use super::stats::{StatsAggregator, StreamStats};
use super::transmit_stage::TransmitStage;
use super::types::{EncodedFrame, Frame, StreamClock};
use crate::capture::{FrameSource, PatternSource};
use crate::config::StreamConfig;
use crate::encoder::{FfmpegEncoder, FrameEncoder};
use crate::net::{DatagramTransmitter, FrameFragmenter, UdpTransmitter};

/// The three external components one pipeline run is built around.
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub encoder: Box<dyn FrameEncoder>,
    pub transmitter: Arc<dyn DatagramTransmitter>,
}

/// Orchestrates the capture → encode → transmit pipeline.
pub struct StreamPipeline {
    state: PipelineState,
    running: Arc<AtomicBool>,
    stats: Arc<StatsAggregator>,
    capture_channel: Option<Arc<TransferChannel<Frame>>>,
    encode_channel: Option<Arc<TransferChannel<EncodedFrame>>>,
    handles: Vec<JoinHandle<()>>,
}

impl StreamPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsAggregator::new()),
            capture_channel: None,
            encode_channel: None,
            handles: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Current throughput snapshot.
    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    /// Start streaming with the production collaborators: the synthetic
    /// pattern source, the ffmpeg encoder and a UDP transmitter.
    pub fn start(&mut self, config: StreamConfig) -> anyhow::Result<()> {
        if self.state.is_busy() {
            bail!("cannot start: pipeline is {}", self.state);
        }
        config.validate()?;

        // Dependency order matters: source, then encoder, then transmitter.
        // Failing partway drops whatever was already opened on the way out.
        let clock = StreamClock::start();
        let source = PatternSource::new(config.width, config.height, clock);
        let encoder =
            FfmpegEncoder::new(config.width, config.height, config.frame_rate, config.bitrate_kbps)
                .context("initializing encoder")?;
        let transmitter = Arc::new(
            UdpTransmitter::connect(config.remote_addr).context("initializing transmitter")?,
        );

        self.start_with(
            config,
            Collaborators {
                source: Box::new(source),
                encoder: Box::new(encoder),
                transmitter,
            },
        )
    }

    /// Start streaming with caller-supplied collaborators.
    ///
    /// Rejected without state change while Starting or Running. On success
    /// the pipeline holds a fresh pair of channels — nothing from a previous
    /// run can ever reach the new stages.
    pub fn start_with(
        &mut self,
        config: StreamConfig,
        collaborators: Collaborators,
    ) -> anyhow::Result<()> {
        if self.state.is_busy() {
            bail!("cannot start: pipeline is {}", self.state);
        }
        config.validate()?;
        let fragmenter = FrameFragmenter::new(config.max_packet_size)?;

        self.state = PipelineState::Starting;

        let capture_channel = Arc::new(TransferChannel::new(config.capture_queue_depth));
        let encode_channel = Arc::new(TransferChannel::new(config.encode_queue_depth));

        self.running.store(true, Ordering::Release);
        self.stats.reset();
        self.stats.attach_transmitter(Arc::clone(&collaborators.transmitter));

        let capture = CaptureStage::new(
            collaborators.source,
            Arc::clone(&capture_channel),
            Arc::clone(&self.running),
            self.stats.capture_counter(),
            config.frame_rate,
        );
        let encode = EncodeStage::new(
            collaborators.encoder,
            Arc::clone(&capture_channel),
            Arc::clone(&encode_channel),
            Arc::clone(&self.running),
            self.stats.encode_counter(),
        );
        let transmit = TransmitStage::new(
            collaborators.transmitter,
            fragmenter,
            Arc::clone(&encode_channel),
            Arc::clone(&self.running),
            self.stats.send_counter(),
        );

        self.capture_channel = Some(capture_channel);
        self.encode_channel = Some(encode_channel);

        // Capture and encode are the latency-critical path; transmit is
        // elevated but may share a core.
        let stages: [(&str, SchedulingHint, Box<dyn FnOnce() + Send>); 3] = [
            ("capture", SchedulingHint::TimeCritical, Box::new(move || capture.run())),
            ("encode", SchedulingHint::TimeCritical, Box::new(move || encode.run())),
            ("transmit", SchedulingHint::Elevated, Box::new(move || transmit.run())),
        ];
        for (name, hint, body) in stages {
            match spawn_stage(name, hint, body) {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    error!("failed to spawn {} stage: {}", name, e);
                    self.teardown();
                    return Err(e).with_context(|| format!("spawning {} stage", name));
                }
            }
        }

        self.state = PipelineState::Running { started_at: Instant::now() };
        info!(
            "pipeline running: {}x{} @ {} fps, {} kbps, dest {}",
            config.width, config.height, config.frame_rate, config.bitrate_kbps, config.remote_addr
        );
        Ok(())
    }

    /// Stop streaming and return to Idle. A no-op on an Idle pipeline, and
    /// safe to call any number of times.
    pub fn stop(&mut self) {
        if self.state.is_idle() {
            return;
        }

        self.state = PipelineState::Stopping;
        self.teardown();
        info!("pipeline stopped");
    }

    /// Shared shutdown path for `stop` and an aborted `start`: flag down,
    /// channels cancelled (the flag alone cannot wake a consumer blocked on
    /// an empty channel), threads joined, channels drained.
    fn teardown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(channel) = &self.capture_channel {
            channel.cancel();
        }
        if let Some(channel) = &self.encode_channel {
            channel.cancel();
        }

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("stage thread panicked during shutdown");
            }
        }

        // Stage structs are gone with their threads, releasing the source
        // and encoder; dropping the stats reference releases the transmitter.
        self.stats.detach_transmitter();

        if let Some(channel) = self.capture_channel.take() {
            channel.clear();
        }
        if let Some(channel) = self.encode_channel.take() {
            channel.clear();
        }

        self.state = PipelineState::Idle;
    }
}

impl Default for StreamPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamPipeline {
    fn drop(&mut self) {
        // Whoever forgot to stop still must not leak threads or sockets.
        self.stop();
    }
}
