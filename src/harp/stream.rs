//! # Streaming Frame Decoder
//!
//! Reassembles Harp frames from a byte stream delivered in arbitrary
//! chunks. A frame may span several chunks and a chunk may hold several
//! frames.
//!
//! Malformed input is reported, never fatal:
//! - a candidate with an impossible length, message type or payload type
//!   byte, or with a bad checksum, is rejected and decoding resumes at the
//!   next byte
//! - a frame with a valid checksum but invalid fields is dropped whole
//! - a candidate whose declared length is not yet available waits for more
//!   bytes

use bytes::{Buf, BytesMut};

use super::decoder::decode_message;
use super::protocol::*;
use crate::error::{HarpError, Result};

/// Counters kept by [`FrameDecoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames decoded successfully
    pub frames: u64,
    /// Candidate frames rejected
    pub errors: u64,
    /// Bytes thrown away while rejecting candidates
    pub bytes_discarded: u64,
}

/// Pull the next frame out of `src`
///
/// Returns `None` when `src` holds no complete candidate yet. Consumed
/// bytes (valid frames and rejected bytes) are removed from `src`.
pub(crate) fn take_frame(src: &mut BytesMut) -> Option<Result<HarpMessage>> {
    if src.is_empty() {
        return None;
    }

    let declared = src[0] as usize;
    if declared < MIN_LENGTH_FIELD {
        src.advance(1);
        return Some(Err(HarpError::FrameTooShort {
            len: declared + 1,
            min: MIN_FRAME_SIZE,
        }));
    }

    // Reject impossible headers early instead of waiting for `declared` bytes
    if src.len() > 1 {
        if let Err(e) = MessageType::from_byte(src[1]) {
            src.advance(1);
            return Some(Err(e));
        }
    }
    if src.len() > 4 {
        if let Err(e) = PayloadType::from_byte(src[4]) {
            src.advance(1);
            return Some(Err(e));
        }
    }

    let total = declared + 1;
    if src.len() < total {
        return None;
    }

    match decode_message(&src[..total]) {
        Ok(message) => {
            src.advance(total);
            Some(Ok(message))
        }
        Err(e @ HarpError::ChecksumMismatch { .. }) => {
            src.advance(1);
            Some(Err(e))
        }
        Err(e) => {
            src.advance(total);
            Some(Err(e))
        }
    }
}

/// Stateful wrapper that owns the accumulation buffer
///
/// # Examples
///
/// ```
/// use harp_audioswitch::harp::encoder::encode_message;
/// use harp_audioswitch::harp::protocol::{HarpMessage, MessageType};
/// use harp_audioswitch::harp::stream::FrameDecoder;
///
/// let frame = encode_message(&HarpMessage::from_u8(32, MessageType::Write, 1));
/// let mut decoder = FrameDecoder::new();
///
/// assert!(decoder.feed(&frame[..3]).is_empty());
/// let messages = decoder.feed(&frame[3..]);
/// assert_eq!(messages.len(), 1);
/// assert!(messages[0].is_ok());
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk received from the transport
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next decoded message or rejected candidate, `None` if more bytes are needed
    pub fn next_frame(&mut self) -> Option<Result<HarpMessage>> {
        let before = self.buffer.len();
        let result = take_frame(&mut self.buffer)?;

        match &result {
            Ok(_) => self.stats.frames += 1,
            Err(_) => {
                self.stats.errors += 1;
                self.stats.bytes_discarded += (before - self.buffer.len()) as u64;
            }
        }
        Some(result)
    }

    /// Append a chunk and drain every result it completes, in stream order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<HarpMessage>> {
        self.extend(chunk);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame, e.g. after reconnecting
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harp::encoder::encode_message;

    fn write_frame() -> (HarpMessage, Vec<u8>) {
        let msg = HarpMessage::from_u8(32, MessageType::Write, 0x01);
        let frame = encode_message(&msg);
        (msg, frame)
    }

    fn event_frame() -> (HarpMessage, Vec<u8>) {
        let msg = HarpMessage::from_value_timestamped(33, 42.5, MessageType::Event, 0x0102u16).unwrap();
        let frame = encode_message(&msg);
        (msg, frame)
    }

    #[test]
    fn test_whole_frame() {
        let (msg, frame) = write_frame();
        let mut decoder = FrameDecoder::new();

        let results = decoder.feed(&frame);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &msg);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().frames, 1);
    }

    #[test]
    fn test_split_at_every_position() {
        let (msg, frame) = event_frame();

        for split in 1..frame.len() {
            let mut decoder = FrameDecoder::new();
            assert!(decoder.feed(&frame[..split]).is_empty(), "split at {}", split);
            assert_eq!(decoder.buffered(), split);

            let results = decoder.feed(&frame[split..]);
            assert_eq!(results.len(), 1, "split at {}", split);
            assert_eq!(results[0].as_ref().unwrap(), &msg);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let (msg, frame) = event_frame();
        let mut decoder = FrameDecoder::new();

        let mut results = Vec::new();
        for byte in &frame {
            results.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &msg);
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let (first, mut chunk) = write_frame();
        let (second, frame) = event_frame();
        chunk.extend_from_slice(&frame);

        let mut decoder = FrameDecoder::new();
        let results = decoder.feed(&chunk);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &first);
        assert_eq!(results[1].as_ref().unwrap(), &second);
    }

    #[test]
    fn test_frame_boundary_inside_chunk() {
        let (first, frame1) = write_frame();
        let (second, frame2) = event_frame();
        let mut stream = frame1.clone();
        stream.extend_from_slice(&frame2);

        // Chunk boundary falls in the middle of the second frame
        let cut = frame1.len() + 4;
        let mut decoder = FrameDecoder::new();
        let mut results = decoder.feed(&stream[..cut]);
        results.extend(decoder.feed(&stream[cut..]));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &first);
        assert_eq!(results[1].as_ref().unwrap(), &second);
    }

    #[test]
    fn test_garbage_prefix_is_skipped() {
        let (msg, frame) = write_frame();
        let mut chunk = vec![0x00, 0x01];
        chunk.extend_from_slice(&frame);

        let mut decoder = FrameDecoder::new();
        let results = decoder.feed(&chunk);

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(HarpError::FrameTooShort { .. })));
        assert!(matches!(results[1], Err(HarpError::FrameTooShort { .. })));
        assert_eq!(results[2].as_ref().unwrap(), &msg);
        assert_eq!(decoder.stats().bytes_discarded, 2);
    }

    #[test]
    fn test_corrupt_frame_does_not_end_session() {
        let (_, mut corrupted) = write_frame();
        corrupted[6] = 0x00; // break checksum
        let (msg, frame) = write_frame();

        let mut decoder = FrameDecoder::new();
        let mut results = decoder.feed(&corrupted);
        results.extend(decoder.feed(&frame));

        assert!(matches!(results[0], Err(HarpError::ChecksumMismatch { .. })));
        let (last, rejected) = results.split_last().unwrap();
        assert_eq!(last.as_ref().unwrap(), &msg);
        assert!(rejected.iter().all(|r| r.is_err()));
        assert_eq!(decoder.stats().frames, 1);
        assert_eq!(decoder.stats().bytes_discarded, corrupted.len() as u64);
    }

    #[test]
    fn test_invalid_message_type_rejected_early() {
        // Plausible length followed by an invalid type byte
        let mut decoder = FrameDecoder::new();
        let results = decoder.feed(&[0x40, 0x00]);

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(HarpError::InvalidMessageType(0x00))));
        assert!(matches!(results[1], Err(HarpError::FrameTooShort { .. })));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_truncated_frame_waits() {
        let (_, frame) = event_frame();
        let mut decoder = FrameDecoder::new();

        assert!(decoder.feed(&frame[..frame.len() - 1]).is_empty());
        assert_eq!(decoder.stats().errors, 0);
        assert_eq!(decoder.buffered(), frame.len() - 1);
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let (msg, frame) = write_frame();
        let mut decoder = FrameDecoder::new();

        decoder.feed(&frame[..4]);
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);

        let results = decoder.feed(&frame);
        assert_eq!(results[0].as_ref().unwrap(), &msg);
    }

    #[test]
    fn test_checksum_valid_but_invalid_fields_dropped_whole() {
        // U16 payload type with 1 payload byte, correct checksum
        let mut frame = vec![0x06, 0x02, 0x21, 0xFF, 0x02, 0x01];
        frame.push(crate::harp::checksum::checksum(&frame));
        let (msg, valid) = write_frame();
        frame.extend_from_slice(&valid);

        let mut decoder = FrameDecoder::new();
        let results = decoder.feed(&frame);

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(HarpError::InvalidPayloadLength(_))));
        assert_eq!(results[1].as_ref().unwrap(), &msg);
    }
}
