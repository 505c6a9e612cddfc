//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management. Bytes are pushed as they
//! arrive from the transport and whole packets are pulled out one at a time.
//! Malformed input is reported once and then discarded, so the buffer
//! resynchronizes on the next start marker.
//!
//! # Example
//!
//! ```
//! use insteon_plm::protocol::{Command, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.push(&[0x02, 0x69]);
//! assert!(buffer.next_packet().is_none());
//!
//! buffer.push(&[0x06]);
//! let packet = buffer.next_packet().unwrap().unwrap();
//! assert_eq!(packet.command, Command::GetFirstAllLink);
//! assert!(packet.is_ack());
//! ```

use bytes::{Buf, BytesMut};

use super::Packet;
use crate::codec::{DecodeResult, PacketCodec};
use crate::error::FramingError;

/// Default initial buffer capacity. Modem frames are at most 25 bytes.
const DEFAULT_CAPACITY: usize = 256;

/// Buffer for accumulating incoming bytes and extracting complete packets.
pub struct FrameBuffer {
    buffer: BytesMut,
}

impl FrameBuffer {
    /// Create a new, empty frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Append bytes read from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next packet.
    ///
    /// Returns:
    /// - `Some(Ok(packet))` if a complete packet was extracted
    /// - `Some(Err(e))` if malformed bytes were discarded
    /// - `None` if more data is needed
    pub fn next_packet(&mut self) -> Option<Result<Packet, FramingError>> {
        match PacketCodec::decode(&self.buffer) {
            DecodeResult::Incomplete => None,
            DecodeResult::Packet(packet, used) => {
                self.buffer.advance(used);
                Some(Ok(packet))
            }
            DecodeResult::Invalid(err, used) => {
                self.buffer.advance(used);
                Some(Err(err))
            }
        }
    }

    /// Drain every packet currently available.
    pub fn drain(&mut self) -> Vec<Result<Packet, FramingError>> {
        std::iter::from_fn(|| self.next_packet()).collect()
    }

    /// Signal end of stream. Reports and drops any incomplete frame.
    pub fn finish(&mut self) -> Option<FramingError> {
        if self.buffer.is_empty() {
            return None;
        }
        let err = FramingError::Truncated(self.buffer.len());
        self.buffer.clear();
        Some(err)
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
