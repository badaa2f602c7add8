//! Binary frame codec for the framed wire dialect.
//!
//! Frames carry a 4-byte fixed header, an optional 4-byte big-endian event
//! number, a 4-byte big-endian payload size, and the payload itself:
//!
//! ```text
//! byte 0: [7:4] protocol version   [3:0] header length in 4-byte words
//! byte 1: [7:4] message type       [3:0] flags (bit 0: event number present)
//! byte 2: [7:4] serialization      [3:0] compression
//! byte 3: reserved
//! ```
//!
//! Encoding and decoding are pure byte-level transformations with no I/O.
//! Decoding is strict: truncation, trailing bytes, an unknown serialization
//! nibble, or a declared size that disagrees with reality all fail rather
//! than guess.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{TTSError, TTSResult};

// ============================================================================
// Wire Constants
// ============================================================================

/// Protocol version carried in the high nibble of byte 0.
pub const PROTOCOL_VERSION: u8 = 0x1;

/// Header length in 4-byte words written by the encoder.
pub const DEFAULT_HEADER_WORDS: u8 = 0x1;

/// Fixed header length in bytes.
pub const FIXED_HEADER_LEN: usize = 4;

/// Client request carrying a full JSON envelope.
pub const MESSAGE_TYPE_FULL_CLIENT: u8 = 0b0001;
/// Server response carrying a full JSON envelope.
pub const MESSAGE_TYPE_FULL_SERVER: u8 = 0b1001;
/// Server response carrying only audio payload.
pub const MESSAGE_TYPE_AUDIO_ONLY: u8 = 0b1011;
/// Server error response.
pub const MESSAGE_TYPE_ERROR: u8 = 0b1111;

/// Flag bit marking a frame that carries an event number.
pub const FLAG_EVENT_NUMBER: u8 = 0b0001;

/// Compression nibble for uncompressed payloads.
pub const COMPRESSION_NONE: u8 = 0x0;

/// Payload serialization carried in the high nibble of byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMethod {
    /// Raw bytes, interpreted as audio by the session layer.
    Raw = 0,
    /// JSON control payload.
    Json = 1,
}

impl SerializationMethod {
    const fn as_nibble(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SerializationMethod {
    type Error = TTSError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Json),
            other => Err(TTSError::MalformedFrame(format!(
                "unknown serialization method {other}"
            ))),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One decoded or to-be-encoded frame.
///
/// The event-number flag bit is derived from `event_number` on encode, so
/// the two can never disagree on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Message type nibble, see the `MESSAGE_TYPE_*` constants.
    pub message_type: u8,
    /// Flags nibble as carried on the wire.
    pub flags: u8,
    /// Payload serialization.
    pub serialization: SerializationMethod,
    /// Compression nibble. Only `COMPRESSION_NONE` is produced today.
    pub compression: u8,
    /// Optional event number, big-endian on the wire.
    pub event_number: Option<u32>,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Builds a full-client request frame with a JSON payload.
    pub fn json_request(payload: Bytes, event_number: Option<u32>) -> Self {
        Self {
            message_type: MESSAGE_TYPE_FULL_CLIENT,
            flags: 0,
            serialization: SerializationMethod::Json,
            compression: COMPRESSION_NONE,
            event_number,
            payload,
        }
    }

    /// Serializes the frame to wire bytes.
    pub fn encode(&self) -> TTSResult<Bytes> {
        if self.payload.len() > u32::MAX as usize {
            return Err(TTSError::MalformedFrame(format!(
                "payload of {} bytes exceeds the 32-bit size field",
                self.payload.len()
            )));
        }

        let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + 8 + self.payload.len());
        buf.put_u8((PROTOCOL_VERSION << 4) | DEFAULT_HEADER_WORDS);
        let flags = if self.event_number.is_some() {
            (self.flags & 0x0F) | FLAG_EVENT_NUMBER
        } else {
            self.flags & 0x0F & !FLAG_EVENT_NUMBER
        };
        buf.put_u8(((self.message_type & 0x0F) << 4) | flags);
        buf.put_u8((self.serialization.as_nibble() << 4) | (self.compression & 0x0F));
        buf.put_u8(0x00);
        if let Some(event) = self.event_number {
            buf.put_u32(event);
        }
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parses wire bytes into a frame.
    ///
    /// Accepts headers longer than one word and skips the extra words, as
    /// the header length field allows. Everything after the declared payload
    /// must be accounted for exactly.
    pub fn decode(input: &[u8]) -> TTSResult<Frame> {
        if input.len() < FIXED_HEADER_LEN {
            return Err(TTSError::MalformedFrame(format!(
                "{} bytes is shorter than the fixed header",
                input.len()
            )));
        }
        let version = input[0] >> 4;
        if version != PROTOCOL_VERSION {
            return Err(TTSError::MalformedFrame(format!(
                "unsupported protocol version {version}"
            )));
        }
        let header_words = input[0] & 0x0F;
        if header_words == 0 {
            return Err(TTSError::MalformedFrame(
                "header length of zero words".to_string(),
            ));
        }
        let header_len = header_words as usize * 4;
        if input.len() < header_len {
            return Err(TTSError::MalformedFrame(format!(
                "{} bytes is shorter than the declared {header_len}-byte header",
                input.len()
            )));
        }

        let message_type = input[1] >> 4;
        let flags = input[1] & 0x0F;
        let serialization = SerializationMethod::try_from(input[2] >> 4)?;
        let compression = input[2] & 0x0F;

        let mut offset = header_len;
        let event_number = if flags & FLAG_EVENT_NUMBER != 0 {
            let event = read_u32(input, offset, "event number")?;
            offset += 4;
            Some(event)
        } else {
            None
        };

        let payload_size = read_u32(input, offset, "payload size")? as usize;
        offset += 4;
        let remaining = input.len() - offset;
        if payload_size > remaining {
            return Err(TTSError::MalformedFrame(format!(
                "declared payload of {payload_size} bytes but only {remaining} remain"
            )));
        }
        if remaining > payload_size {
            return Err(TTSError::MalformedFrame(format!(
                "{} trailing bytes after the payload",
                remaining - payload_size
            )));
        }

        Ok(Frame {
            message_type,
            flags,
            serialization,
            compression,
            event_number,
            payload: Bytes::copy_from_slice(&input[offset..offset + payload_size]),
        })
    }

    /// True when the input is shaped like a frame: long enough for the fixed
    /// header and carrying the recognized version nibble.
    ///
    /// Inputs that fail this test are treated as bare audio by the session
    /// layer rather than decoded.
    pub fn looks_like_frame(input: &[u8]) -> bool {
        input.len() >= FIXED_HEADER_LEN && input[0] >> 4 == PROTOCOL_VERSION
    }
}

fn read_u32(input: &[u8], offset: usize, field: &str) -> TTSResult<u32> {
    input
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| TTSError::MalformedFrame(format!("input truncated before {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_frame(payload: &[u8]) -> Frame {
        Frame {
            message_type: MESSAGE_TYPE_AUDIO_ONLY,
            flags: 0,
            serialization: SerializationMethod::Raw,
            compression: COMPRESSION_NONE,
            event_number: None,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    // ========================================================================
    // Round-Trip Tests
    // ========================================================================

    #[test]
    fn test_round_trip_preserves_every_field() {
        let frame = Frame {
            message_type: MESSAGE_TYPE_FULL_CLIENT,
            flags: 0,
            serialization: SerializationMethod::Json,
            compression: COMPRESSION_NONE,
            event_number: Some(100),
            payload: Bytes::from_static(b"{\"event\":100}"),
        };
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.message_type, frame.message_type);
        assert_eq!(decoded.serialization, frame.serialization);
        assert_eq!(decoded.compression, frame.compression);
        assert_eq!(decoded.event_number, Some(100));
        assert_eq!(decoded.payload, frame.payload);
        assert_ne!(decoded.flags & FLAG_EVENT_NUMBER, 0);
    }

    #[test]
    fn test_round_trip_without_event_number() {
        let frame = audio_frame(b"pcm-bytes");
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded.event_number, None);
        assert_eq!(decoded.flags & FLAG_EVENT_NUMBER, 0);
        assert_eq!(decoded.payload, Bytes::from_static(b"pcm-bytes"));
    }

    #[test]
    fn test_round_trip_zero_length_payload() {
        let decoded = Frame::decode(&audio_frame(b"").encode().unwrap()).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_control_frame_wire_layout() {
        // A typed control response: message type 1, JSON payload, no event
        // number. The header must be exactly [0x11, 0x10, 0x10, 0x00].
        let payload = b"{\"status_code\":20000000}";
        let frame = Frame {
            message_type: 0b0001,
            flags: 0,
            serialization: SerializationMethod::Json,
            compression: COMPRESSION_NONE,
            event_number: None,
            payload: Bytes::copy_from_slice(payload),
        };
        let encoded = frame.encode().unwrap();
        assert_eq!(&encoded[..4], &[0x11, 0x10, 0x10, 0x00]);
        assert_eq!(&encoded[4..8], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&encoded[8..], payload);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.serialization, SerializationMethod::Json);
        assert_eq!(decoded.event_number, None);
        assert_eq!(decoded.payload, Bytes::copy_from_slice(payload));
    }

    #[test]
    fn test_event_flag_derived_from_event_number() {
        // A stale flag bit cannot produce a frame that lies about its shape.
        let mut frame = audio_frame(b"x");
        frame.flags = FLAG_EVENT_NUMBER;
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded.event_number, None);
        assert_eq!(decoded.flags & FLAG_EVENT_NUMBER, 0);
    }

    // ========================================================================
    // Header Validation Tests
    // ========================================================================

    #[test]
    fn test_decode_rejects_short_input() {
        for len in 0..FIXED_HEADER_LEN {
            let input = vec![0x11; len];
            assert!(
                matches!(Frame::decode(&input), Err(TTSError::MalformedFrame(_))),
                "{len}-byte input must be rejected"
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut encoded = audio_frame(b"abc").encode().unwrap().to_vec();
        encoded[0] = (0x7 << 4) | DEFAULT_HEADER_WORDS;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(TTSError::MalformedFrame(_))
        ));
        assert!(!Frame::looks_like_frame(&encoded));
    }

    #[test]
    fn test_decode_rejects_zero_header_words() {
        let input = [(PROTOCOL_VERSION << 4), 0xB0, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&input),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_input_shorter_than_declared_header() {
        // Declares a two-word header but supplies only six bytes.
        let input = [(PROTOCOL_VERSION << 4) | 0x2, 0xB0, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&input),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_skips_extended_header_words() {
        // Two-word header: four padding bytes before the payload size.
        let mut input = vec![(PROTOCOL_VERSION << 4) | 0x2, 0xB0, 0x00, 0x00];
        input.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        input.extend_from_slice(&3u32.to_be_bytes());
        input.extend_from_slice(b"abc");
        let decoded = Frame::decode(&input).unwrap();
        assert_eq!(decoded.message_type, MESSAGE_TYPE_AUDIO_ONLY);
        assert_eq!(decoded.payload, Bytes::from_static(b"abc"));
    }

    // ========================================================================
    // Payload Validation Tests
    // ========================================================================

    #[test]
    fn test_decode_rejects_truncated_payload_size() {
        // Valid header, then only two of the four size bytes.
        let input = [0x11, 0xB0, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&input),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_event_number() {
        let input = [0x11, 0xB1, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            Frame::decode(&input),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_payload_shorter_than_declared() {
        let mut encoded = audio_frame(b"abcdef").encode().unwrap().to_vec();
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(
            Frame::decode(&encoded),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = audio_frame(b"abcdef").encode().unwrap().to_vec();
        encoded.push(0x00);
        assert!(matches!(
            Frame::decode(&encoded),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_serialization() {
        let mut encoded = audio_frame(b"abc").encode().unwrap().to_vec();
        encoded[2] = 0xF0;
        assert!(matches!(
            Frame::decode(&encoded),
            Err(TTSError::MalformedFrame(_))
        ));
    }

    // ========================================================================
    // Frame Shape Tests
    // ========================================================================

    #[test]
    fn test_looks_like_frame() {
        assert!(Frame::looks_like_frame(&[0x11, 0x00, 0x00, 0x00]));
        assert!(!Frame::looks_like_frame(&[0x11, 0x00, 0x00]));
        assert!(!Frame::looks_like_frame(&[0xFF, 0xF3, 0x40, 0xC0]));
        assert!(!Frame::looks_like_frame(b""));
    }
}
