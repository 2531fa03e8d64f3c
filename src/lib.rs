//! Low-latency UDP video casting
//!
//! framecast captures frames from a video source, encodes them to H.264 and
//! fragments each encoded frame into headered UDP datagrams aimed at a fixed
//! receiver. Everything is tuned for end-to-end latency over throughput or
//! reliability: bounded drop-oldest channels between the pipeline stages,
//! no retransmission, no waiting anywhere a frame could be dropped instead.
//!
//! # Example
//!
//! ```no_run
//! use framecast::config::StreamConfig;
//! use framecast::pipeline::StreamPipeline;
//!
//! let mut pipeline = StreamPipeline::new();
//! pipeline.start(StreamConfig::default())?;
//! // ... stream until done ...
//! println!("{}", pipeline.stats());
//! pipeline.stop();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod capture;
pub mod config;
pub mod encoder;
pub mod net;
pub mod pipeline;

pub use config::StreamConfig;
pub use pipeline::{StreamPipeline, StreamStats};
