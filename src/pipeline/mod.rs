//! Real-time streaming pipeline
//!
//! Three long-lived OS threads — capture, encode, transmit — connected by
//! two bounded drop-oldest channels. Latency beats completeness throughout:
//! a stage that falls behind sees fewer frames, never older ones, and no
//! stage ever blocks a stage upstream of it.
//!
//! # Shape
//!
//! ```text
//! FrameSource -> [capture] -> channel A -> [encode] -> channel B -> [transmit] -> UDP
//! ```
//!
//! The [`StreamPipeline`] orchestrator owns the lifecycle: it brings the
//! collaborators up in order, spawns the stages, and tears everything down
//! on `stop()` by dropping the shared running flag *and* cancelling both
//! channels so blocked consumers wake immediately.

pub mod capture_stage;
pub mod channel;
pub mod coordinator;
pub mod encode_stage;
pub mod stage;
pub mod state;
pub mod stats;
pub mod transmit_stage;
pub mod types;

pub use channel::{PushOutcome, TransferChannel};
pub use coordinator::{Collaborators, StreamPipeline};
pub use stage::SchedulingHint;
pub use state::PipelineState;
pub use stats::{StatsAggregator, StreamStats};
pub use types::{EncodedFrame, Frame, StreamClock};
