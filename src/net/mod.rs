//! Wire protocol and datagram transport

pub mod fragment;
pub mod udp;

pub use fragment::{FragmentError, FrameFragmenter, PacketHeader, DEFAULT_MAX_PACKET_SIZE, HEADER_SIZE};
pub use udp::UdpTransmitter;

/// Result of handing one datagram to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the local stack (delivery still not guaranteed)
    Sent,
    /// Transiently refused; the fragment is lost and that is fine
    Rejected,
}

/// Transport collaborator: delivers single datagrams to a preconfigured
/// remote endpoint, without blocking and without retrying.
///
/// Implementations keep cumulative, monotonically increasing byte/packet
/// counters; the stats aggregator reads them and never resets them.
pub trait DatagramTransmitter: Send + Sync {
    fn send(&self, payload: &[u8]) -> SendOutcome;

    fn bytes_sent(&self) -> u64;

    fn packets_sent(&self) -> u64;
}
