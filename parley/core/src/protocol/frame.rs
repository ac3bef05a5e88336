//! Frame Protocol
//!
//! Wire format for stream events using length-prefixed JSON with a
//! CRC32 checksum for integrity verification.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+----------------+------------------------------------------+
//! | Length (4)     | Checksum (4)   | JSON Payload (variable)                  |
//! | big-endian u32 | CRC32          | StreamEvent                              |
//! +----------------+----------------+------------------------------------------+
//! ```
//!
//! The Length field covers the JSON payload only. The framing is
//! self-delimiting: delta text may contain newlines, braces, or any
//! other byte sequence without colliding with event boundaries.
//!
//! # Security
//!
//! - Maximum frame size is enforced before allocating a buffer
//! - CRC32 detects corruption in transit

use crate::error::ProtocolError;
use crate::protocol::events::StreamEvent;

/// Maximum frame size (1 MB)
///
/// Assistant content is capped well below this; the limit prevents
/// memory exhaustion from corrupted length prefixes.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Minimum buffer capacity for the decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Frame header size: 4 bytes length + 4 bytes checksum
const HEADER_SIZE: usize = 8;

#[inline]
fn compute_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a stream event to a length-prefixed frame with CRC32 checksum
///
/// # Errors
///
/// Returns `ProtocolError::FrameTooLarge` if the serialized payload
/// exceeds [`MAX_FRAME_SIZE`], or `ProtocolError::MalformedPayload` if
/// serialization fails.
pub fn encode_event(event: &StreamEvent) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(event)
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    if json.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: json.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let len = json.len() as u32;
    let checksum = compute_checksum(&json);

    let mut buf = Vec::with_capacity(HEADER_SIZE + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&checksum.to_be_bytes());
    buf.extend_from_slice(&json);
    Ok(buf)
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming transport chunks and yields complete events. Frames
/// split across arbitrary chunk boundaries are reassembled.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position we have consumed up to
    read_pos: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append transport bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact the buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Number of unconsumed bytes in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next event
    ///
    /// Returns:
    /// - `Ok(Some(event))` if a complete frame was decoded
    /// - `Ok(None)` if more data is needed
    /// - `Err(ProtocolError::ChecksumMismatch)` on corruption
    /// - `Err(...)` if the frame is otherwise invalid
    pub fn next_frame(&mut self) -> Result<Option<StreamEvent>, ProtocolError> {
        let available = self.available();

        if available < HEADER_SIZE {
            return Ok(None);
        }

        let len_bytes = &self.buffer[self.read_pos..self.read_pos + 4];
        let len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        if available < HEADER_SIZE + len {
            return Ok(None);
        }

        let checksum_bytes = &self.buffer[self.read_pos + 4..self.read_pos + 8];
        let expected_checksum = u32::from_be_bytes([
            checksum_bytes[0],
            checksum_bytes[1],
            checksum_bytes[2],
            checksum_bytes[3],
        ]);

        let payload_start = self.read_pos + HEADER_SIZE;
        let payload_end = payload_start + len;
        let payload = &self.buffer[payload_start..payload_end];

        let actual_checksum = compute_checksum(payload);
        if actual_checksum != expected_checksum {
            return Err(ProtocolError::ChecksumMismatch {
                expected: expected_checksum,
                actual: actual_checksum,
            });
        }

        let event = serde_json::from_slice(payload)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

        self.read_pos = payload_end;

        Ok(Some(event))
    }

    /// Whether the buffer holds a partial, never-completable frame
    ///
    /// Meaningful only once the transport has closed: any unconsumed
    /// bytes left behind are a truncated trailing frame.
    #[must_use]
    pub fn has_partial_frame(&self) -> bool {
        self.available() > 0
    }
}
