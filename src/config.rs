//! Stream configuration
//!
//! Plain scalar fields with documented defaults; immutable for the lifetime
//! of one pipeline run. Values can come from an optional JSON file, with CLI
//! flags overriding individual fields on top.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::net::HEADER_SIZE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Output width in pixels (must be even, NV12 alignment)
    pub width: u32,

    /// Output height in pixels (must be even)
    pub height: u32,

    /// Capture pacing target in frames per second
    pub frame_rate: u32,

    /// Encoder bitrate in kilobits per second
    pub bitrate_kbps: u32,

    /// Capacity of the capture → encode channel
    pub capture_queue_depth: usize,

    /// Capacity of the encode → transmit channel
    pub encode_queue_depth: usize,

    /// Receiver endpoint for the datagram stream
    pub remote_addr: SocketAddr,

    /// Full datagram budget in bytes, fragment header included
    pub max_packet_size: usize,

    /// Seconds between throughput log lines
    pub stats_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
            frame_rate: 200,
            bitrate_kbps: 15_000,
            capture_queue_depth: 2,
            encode_queue_depth: 2,
            remote_addr: "127.0.0.1:5000".parse().unwrap(),
            max_packet_size: crate::net::DEFAULT_MAX_PACKET_SIZE,
            stats_interval_secs: 1,
        }
    }
}

impl StreamConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "resolution {}x{} must be even for NV12",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame rate must be positive".into()));
        }
        if self.bitrate_kbps == 0 {
            return Err(ConfigError::Invalid("bitrate must be positive".into()));
        }
        if self.capture_queue_depth == 0 || self.encode_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "channel depths must be at least 1".into(),
            ));
        }
        if self.max_packet_size <= HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max packet size {} leaves no payload room ({}-byte header)",
                self.max_packet_size, HEADER_SIZE
            )));
        }
        if self.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stats interval must be at least one second".into(),
            ));
        }
        Ok(())
    }
}
