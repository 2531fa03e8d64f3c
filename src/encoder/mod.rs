//! Hardware encoder collaborator seam

pub mod ffmpeg;

pub use ffmpeg::FfmpegEncoder;

use crate::pipeline::types::{EncodedFrame, Frame};

/// Video encoder collaborator: one logical call per frame, stateful across
/// calls (rate control, GOP tracking).
///
/// The frame is consumed; once `encode` returns, the raw pixels are gone and
/// only the compressed bitstream moves further down the pipeline. An error
/// means this one frame is lost, nothing more — the encode stage drops the
/// unit and keeps running.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: Frame) -> anyhow::Result<EncodedFrame>;
}
