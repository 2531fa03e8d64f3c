//! H.264 encoding via ac-ffmpeg
//!
//! Tries hardware encoders first and falls back to libx264. Every entry in
//! the chain is tuned for latency over quality: no B-frames, no lookahead,
//! zero-delay operation.

use ac_ffmpeg::codec::video::{self, VideoEncoder, VideoFrame, VideoFrameMut};
use ac_ffmpeg::codec::Encoder;
use ac_ffmpeg::time::{TimeBase, Timestamp};
use anyhow::{anyhow, Context};
use bytes::Bytes;
use log::{debug, info};

use super::FrameEncoder;
use crate::pipeline::types::{EncodedFrame, Frame};

/// Candidate encoders, best first. Options common to low-latency streaming;
/// bitrate, GOP and rate control limits are filled in from the stream
/// settings at build time.
const ENCODER_CHAIN: &[(&str, &[(&str, &str)])] = &[
    (
        "h264_nvenc",
        &[
            ("preset", "p1"),
            ("tune", "ull"),
            ("zerolatency", "1"),
            ("rc", "cbr"),
            ("delay", "0"),
        ],
    ),
    (
        "h264_qsv",
        &[("preset", "veryfast"), ("low_power", "1"), ("async_depth", "1")],
    ),
    (
        "libx264",
        &[
            ("preset", "ultrafast"),
            ("tune", "zerolatency"),
            ("bframes", "0"),
            ("sync-lookahead", "0"),
            ("sliced-threads", "1"),
        ],
    ),
];

/// 90 kHz video time base; frame timestamps arrive in microseconds.
const TIME_BASE: (i32, i32) = (1, 90_000);

pub struct FfmpegEncoder {
    encoder: VideoEncoder,
    codec_name: String,
    width: usize,
    height: usize,
    /// Reusable frozen frames; refilled on put, drained on take.
    pool: Vec<VideoFrame>,
    time_base: TimeBase,
    pixel_format: video::frame::PixelFormat,
}

// The ffmpeg context is only ever driven from the encode stage thread.
unsafe impl Send for FfmpegEncoder {}

impl FfmpegEncoder {
    /// Build the first encoder in the chain that initializes.
    ///
    /// Fails with an error (the pipeline rolls its start back) when none of
    /// the candidates is available in the local ffmpeg build.
    pub fn new(width: u32, height: u32, frame_rate: u32, bitrate_kbps: u32) -> anyhow::Result<Self> {
        let width = width as usize;
        let height = height as usize;
        let time_base = TimeBase::new(TIME_BASE.0, TIME_BASE.1);
        let pixel_format = video::frame::get_pixel_format("nv12");

        let bitrate = (bitrate_kbps as u64 * 1_000).to_string();
        // Keyframe every two seconds keeps a join-in-progress receiver from
        // waiting long for a decodable point.
        let gop = (frame_rate.max(1) * 2).to_string();

        for (codec, options) in ENCODER_CHAIN {
            let mut builder = match VideoEncoder::builder(codec) {
                Ok(b) => b,
                Err(e) => {
                    debug!("encoder {} unavailable: {}", codec, e);
                    continue;
                }
            };

            builder = builder
                .pixel_format(pixel_format)
                .width(width)
                .height(height)
                .time_base(time_base)
                .set_option("b", &bitrate)
                .set_option("g", &gop);
            for (k, v) in *options {
                builder = builder.set_option(k, v);
            }

            match builder.build() {
                Ok(encoder) => {
                    info!(
                        "encoder: {} {}x{} @ {} kbps, {} fps target",
                        codec, width, height, bitrate_kbps, frame_rate
                    );
                    return Ok(Self {
                        encoder,
                        codec_name: codec.to_string(),
                        width,
                        height,
                        pool: Vec::new(),
                        time_base,
                        pixel_format,
                    });
                }
                Err(e) => debug!("encoder {} failed to initialize: {}", codec, e),
            }
        }

        Err(anyhow!(
            "no H.264 encoder available (tried nvenc, qsv, libx264)"
        ))
    }

    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    fn take_frame(&mut self) -> VideoFrameMut {
        while let Some(frame) = self.pool.pop() {
            match frame.try_into_mut() {
                Ok(frame) => return frame,
                // Still referenced by the encoder; let it go.
                Err(_) => continue,
            }
        }
        VideoFrameMut::black(self.pixel_format, self.width, self.height)
            .with_time_base(self.time_base)
    }

    /// Copy one packed plane into an encoder plane that may carry per-row
    /// padding.
    fn copy_plane(src: &[u8], row_bytes: usize, rows: usize, dst: &mut [u8]) {
        let dst_line = dst.len() / rows;
        if dst_line == row_bytes {
            dst[..row_bytes * rows].copy_from_slice(&src[..row_bytes * rows]);
            return;
        }
        for r in 0..rows {
            dst[r * dst_line..r * dst_line + row_bytes]
                .copy_from_slice(&src[r * row_bytes..(r + 1) * row_bytes]);
        }
    }
}

impl FrameEncoder for FfmpegEncoder {
    fn encode(&mut self, frame: Frame) -> anyhow::Result<EncodedFrame> {
        if frame.width as usize != self.width || frame.height as usize != self.height {
            return Err(anyhow!(
                "frame {} is {}x{}, encoder expects {}x{}",
                frame.index,
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }

        let luma_len = self.width * self.height;
        let chroma_len = luma_len / 2;
        if frame.data.len() < luma_len + chroma_len {
            return Err(anyhow!(
                "frame {}: {} bytes is short for NV12 {}x{}",
                frame.index,
                frame.data.len(),
                self.width,
                self.height
            ));
        }

        let mut video_frame = self.take_frame();
        // Microseconds to 90 kHz ticks.
        let pts = (frame.timestamp_us as i64 * 9) / 100;
        video_frame = video_frame.with_pts(Timestamp::new(pts, self.time_base));

        {
            let mut planes = video_frame.planes_mut();
            Self::copy_plane(&frame.data[..luma_len], self.width, self.height, planes[0].data_mut());
            Self::copy_plane(
                &frame.data[luma_len..luma_len + chroma_len],
                self.width,
                self.height / 2,
                planes[1].data_mut(),
            );
        }

        let video_frame = video_frame.freeze();
        self.encoder
            .push(video_frame.clone())
            .with_context(|| format!("pushing frame {}", frame.index))?;
        self.pool.push(video_frame);

        let mut out = Vec::with_capacity(32 * 1024);
        while let Some(packet) = self.encoder.take()? {
            out.extend_from_slice(packet.data());
        }

        Ok(EncodedFrame {
            data: Bytes::from(out),
            frame_index: frame.index,
            timestamp_us: frame.timestamp_us,
        })
    }
}
