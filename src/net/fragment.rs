//! Datagram fragmentation protocol
//!
//! Each encoded frame is split into an ordered run of datagrams, every one
//! carrying a fixed 12-byte header so the receiver can regroup fragments by
//! frame and detect gaps:
//!
//! ```text
//! offset 0  u32  frame_id      low 32 bits of the frame index
//! offset 4  u16  packet_id     0-based fragment index within the frame
//! offset 6  u16  packet_count  total fragments for this frame
//! offset 8  u32  timestamp     low 32 bits of the frame timestamp (µs)
//! ```
//!
//! All fields are big-endian. `packet_count` is fixed at fragmentation time;
//! a frame that would need more than 65535 fragments is rejected outright
//! rather than silently truncated.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::pipeline::types::EncodedFrame;

/// Size of the per-datagram header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Default datagram budget, header included. Comfortably under a 1500-byte
/// Ethernet MTU after IP/UDP overhead.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1400;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FragmentError {
    #[error("max packet size {0} leaves no payload room ({HEADER_SIZE}-byte header)")]
    PacketSizeTooSmall(usize),

    #[error("frame {frame_index} ({len} bytes) needs {required} fragments, protocol limit is {max}")]
    TooManyFragments {
        frame_index: u64,
        len: usize,
        required: usize,
        max: usize,
    },
}

/// Per-datagram sequencing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub frame_id: u32,
    pub packet_id: u16,
    pub packet_count: u16,
    pub timestamp: u32,
}

impl PacketHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32(self.frame_id);
        buf.put_u16(self.packet_id);
        buf.put_u16(self.packet_count);
        buf.put_u32(self.timestamp);
    }

    /// Decode a header from the front of a datagram. `None` if the slice is
    /// shorter than a header.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            frame_id: u32::from_be_bytes(data[0..4].try_into().unwrap()),
            packet_id: u16::from_be_bytes(data[4..6].try_into().unwrap()),
            packet_count: u16::from_be_bytes(data[6..8].try_into().unwrap()),
            timestamp: u32::from_be_bytes(data[8..12].try_into().unwrap()),
        })
    }
}

/// Splits encoded frames into wire-ready datagrams.
///
/// The produced sequence covers the frame exactly once, in order, with no
/// gaps or overlaps: fragment `i` carries bytes
/// `[i * payload, min(len, (i + 1) * payload))`.
pub struct FrameFragmenter {
    max_packet_size: usize,
    payload_size: usize,
}

impl FrameFragmenter {
    /// `max_packet_size` is the full datagram budget including the header
    /// and must leave at least one payload byte.
    pub fn new(max_packet_size: usize) -> Result<Self, FragmentError> {
        if max_packet_size <= HEADER_SIZE {
            return Err(FragmentError::PacketSizeTooSmall(max_packet_size));
        }
        Ok(Self {
            max_packet_size,
            payload_size: max_packet_size - HEADER_SIZE,
        })
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Payload bytes available per datagram.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Fragment one encoded frame into datagrams.
    ///
    /// An empty frame produces no datagrams at all; there is nothing the
    /// receiver could do with a zero-length fragment run.
    pub fn fragment(&self, frame: &EncodedFrame) -> Result<Vec<Bytes>, FragmentError> {
        let len = frame.data.len();
        if len == 0 {
            return Ok(Vec::new());
        }

        let packet_count = len.div_ceil(self.payload_size);
        if packet_count > u16::MAX as usize {
            return Err(FragmentError::TooManyFragments {
                frame_index: frame.frame_index,
                len,
                required: packet_count,
                max: u16::MAX as usize,
            });
        }

        let frame_id = frame.frame_index as u32;
        let timestamp = frame.timestamp_us as u32;

        let mut packets = Vec::with_capacity(packet_count);
        for i in 0..packet_count {
            let start = i * self.payload_size;
            let end = len.min(start + self.payload_size);

            let header = PacketHeader {
                frame_id,
                packet_id: i as u16,
                packet_count: packet_count as u16,
                timestamp,
            };

            let mut buf = BytesMut::with_capacity(HEADER_SIZE + (end - start));
            header.write_to(&mut buf);
            buf.put_slice(&frame.data[start..end]);
            packets.push(buf.freeze());
        }

        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> EncodedFrame {
        EncodedFrame {
            data: Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>()),
            frame_index: 7,
            timestamp_us: 123_456,
        }
    }

    #[test]
    fn header_layout_is_big_endian() {
        let header = PacketHeader {
            frame_id: 0x0102_0304,
            packet_id: 0x0506,
            packet_count: 0x0708,
            timestamp: 0x090A_0B0C,
        };
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C]
        );
    }

    #[test]
    fn header_round_trips() {
        let header = PacketHeader {
            frame_id: 42,
            packet_id: 3,
            packet_count: 9,
            timestamp: 0xDEAD_BEEF,
        };
        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(PacketHeader::parse(&buf), Some(header));
    }

    #[test]
    fn parse_rejects_short_input() {
        assert_eq!(PacketHeader::parse(&[0u8; HEADER_SIZE - 1]), None);
    }

    #[test]
    fn three_kilobyte_frame_at_default_packet_size() {
        let fragmenter = FrameFragmenter::new(1400).unwrap();
        assert_eq!(fragmenter.payload_size(), 1388);

        let packets = fragmenter.fragment(&encoded(3000)).unwrap();
        assert_eq!(packets.len(), 3);

        let payload_lens: Vec<usize> =
            packets.iter().map(|p| p.len() - HEADER_SIZE).collect();
        assert_eq!(payload_lens, vec![1388, 1388, 224]);

        for (i, packet) in packets.iter().enumerate() {
            let header = PacketHeader::parse(packet).unwrap();
            assert_eq!(header.packet_id, i as u16);
            assert_eq!(header.packet_count, 3);
            assert_eq!(header.frame_id, 7);
        }
    }

    #[test]
    fn payload_concatenation_reproduces_the_frame() {
        let frame = encoded(4_321);
        let fragmenter = FrameFragmenter::new(256).unwrap();

        let packets = fragmenter.fragment(&frame).unwrap();
        let mut reassembled = Vec::new();
        for packet in &packets {
            reassembled.extend_from_slice(&packet[HEADER_SIZE..]);
        }
        assert_eq!(reassembled, frame.data);
    }

    #[test]
    fn empty_frame_yields_no_packets() {
        let fragmenter = FrameFragmenter::new(1400).unwrap();
        assert!(fragmenter.fragment(&encoded(0)).unwrap().is_empty());
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let fragmenter = FrameFragmenter::new(1400).unwrap();
        let packets = fragmenter.fragment(&encoded(1388 * 2)).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(packets.iter().all(|p| p.len() == 1400));
    }

    #[test]
    fn single_byte_frame_is_one_packet() {
        let fragmenter = FrameFragmenter::new(1400).unwrap();
        let packets = fragmenter.fragment(&encoded(1)).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), HEADER_SIZE + 1);
        let header = PacketHeader::parse(&packets[0]).unwrap();
        assert_eq!(header.packet_count, 1);
    }

    #[test]
    fn fragment_count_overflow_is_a_hard_error() {
        // One payload byte per packet makes the limit easy to cross.
        let fragmenter = FrameFragmenter::new(HEADER_SIZE + 1).unwrap();
        let frame = encoded(u16::MAX as usize + 1);

        match fragmenter.fragment(&frame) {
            Err(FragmentError::TooManyFragments { required, max, .. }) => {
                assert_eq!(required, u16::MAX as usize + 1);
                assert_eq!(max, u16::MAX as usize);
            }
            other => panic!("expected TooManyFragments, got {:?}", other),
        }
    }

    #[test]
    fn packet_size_must_exceed_header() {
        assert!(matches!(
            FrameFragmenter::new(HEADER_SIZE),
            Err(FragmentError::PacketSizeTooSmall(_))
        ));
        assert!(FrameFragmenter::new(HEADER_SIZE + 1).is_ok());
    }

    #[test]
    fn frame_id_and_timestamp_take_the_low_32_bits() {
        let frame = EncodedFrame {
            data: Bytes::from_static(b"x"),
            frame_index: 0x1_0000_0002,
            timestamp_us: 0x9_0000_0003,
        };
        let fragmenter = FrameFragmenter::new(1400).unwrap();
        let packets = fragmenter.fragment(&frame).unwrap();
        let header = PacketHeader::parse(&packets[0]).unwrap();
        assert_eq!(header.frame_id, 2);
        assert_eq!(header.timestamp, 3);
    }
}
