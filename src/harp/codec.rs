//! # Harp Codec
//!
//! `tokio_util` codec so a serial stream can be wrapped in `Framed`.
//! Malformed frames are logged and skipped; only I/O errors end the stream.
//! A partial frame left at end of stream is discarded.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use super::encoder::encode_into;
use super::protocol::HarpMessage;
use super::stream::{take_frame, DecoderStats};
use crate::error::HarpError;

/// Codec for Harp frames
#[derive(Debug, Default)]
pub struct HarpCodec {
    stats: DecoderStats,
}

impl HarpCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

impl Decoder for HarpCodec {
    type Item = HarpMessage;
    type Error = HarpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HarpMessage>, HarpError> {
        loop {
            let before = src.len();
            match take_frame(src) {
                None => return Ok(None),
                Some(Ok(message)) => {
                    self.stats.frames += 1;
                    debug!(
                        "Received {} frame for register {} ({} bytes)",
                        message.message_type(),
                        message.address(),
                        message.frame_size()
                    );
                    return Ok(Some(message));
                }
                Some(Err(e)) => {
                    self.stats.errors += 1;
                    self.stats.bytes_discarded += (before - src.len()) as u64;
                    warn!("Dropped malformed frame: {}", e);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<HarpMessage>, HarpError> {
        let mut dropped = 0usize;
        loop {
            if let Some(message) = self.decode(src)? {
                if dropped > 0 {
                    warn!("Discarded {} bytes of incomplete frame data", dropped);
                }
                return Ok(Some(message));
            }
            if src.is_empty() {
                break;
            }
            // The head cannot complete any more; later bytes may still hold a frame
            src.advance(1);
            dropped += 1;
            self.stats.bytes_discarded += 1;
        }

        if dropped > 0 {
            self.stats.errors += 1;
            warn!("Discarded {} trailing bytes at end of stream", dropped);
        }
        Ok(None)
    }
}

impl Encoder<HarpMessage> for HarpCodec {
    type Error = HarpError;

    fn encode(&mut self, item: HarpMessage, dst: &mut BytesMut) -> Result<(), HarpError> {
        encode_into(&item, dst);
        Ok(())
    }
}

impl<'a> Encoder<&'a HarpMessage> for HarpCodec {
    type Error = HarpError;

    fn encode(&mut self, item: &'a HarpMessage, dst: &mut BytesMut) -> Result<(), HarpError> {
        encode_into(item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harp::encoder::encode_message;
    use crate::harp::protocol::MessageType;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn test_decode_skips_garbage() {
        let msg = HarpMessage::from_u16(33, MessageType::Event, 0x00F0);
        let mut src = BytesMut::from(&[0x00, 0x02][..]);
        src.extend_from_slice(&encode_message(&msg));

        let mut codec = HarpCodec::new();
        let decoded = codec.decode(&mut src).unwrap();

        assert_eq!(decoded, Some(msg));
        assert!(src.is_empty());
        assert_eq!(codec.stats().errors, 2);
        assert_eq!(codec.stats().frames, 1);
    }

    #[test]
    fn test_decode_incomplete() {
        let frame = encode_message(&HarpMessage::from_u8(32, MessageType::Write, 1));
        let mut src = BytesMut::from(&frame[..5]);

        let mut codec = HarpCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(src.len(), 5);

        src.extend_from_slice(&frame[5..]);
        assert!(codec.decode(&mut src).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_framed_read_ends_on_partial_frame() {
        let first = HarpMessage::from_u8(32, MessageType::Read, 0);
        let partial = encode_message(&HarpMessage::from_u16(33, MessageType::Event, 0x0003));

        let mut bytes = encode_message(&first);
        bytes.extend_from_slice(&partial[..3]);

        let mut framed = FramedRead::new(&bytes[..], HarpCodec::new());
        assert_eq!(framed.next().await.unwrap().unwrap(), first);
        assert!(framed.next().await.is_none());

        let stats = framed.decoder().stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.bytes_discarded, 3);
    }

    #[test]
    fn test_decode_eof_recovers_frame_behind_long_length_byte() {
        let msg = HarpMessage::from_u8(32, MessageType::Write, 1);
        // Plausible header whose length byte reaches past the end of the input
        let mut src = BytesMut::from(&[0x40, 0x02, 0x20, 0xFF, 0x01][..]);
        src.extend_from_slice(&encode_message(&msg));

        let mut codec = HarpCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut src).unwrap(), Some(msg));
        assert_eq!(codec.decode_eof(&mut src).unwrap(), None);
        assert!(src.is_empty());
        assert_eq!(codec.stats().bytes_discarded, 5);
    }

    #[test]
    fn test_encode() {
        let msg = HarpMessage::from_u8(32, MessageType::Write, 1);
        let mut dst = BytesMut::new();
        HarpCodec::new().encode(&msg, &mut dst).unwrap();
        assert_eq!(dst.to_vec(), encode_message(&msg));
    }

    #[tokio::test]
    async fn test_framed_read_stream() {
        let first = HarpMessage::from_u8(32, MessageType::Read, 0);
        let second = HarpMessage::from_value_timestamped(34, 3.0, MessageType::Event, 0x05u8).unwrap();

        let mut bytes = encode_message(&first);
        bytes.push(0xEE); // noise between frames
        bytes.extend(encode_message(&second));

        let mut framed = FramedRead::new(&bytes[..], HarpCodec::new());
        assert_eq!(framed.next().await.unwrap().unwrap(), first);
        assert_eq!(framed.next().await.unwrap().unwrap(), second);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_framed_write_sink() {
        let msg = HarpMessage::from_u16(33, MessageType::Write, 0x0011);
        let mut out = Vec::new();
        {
            let mut framed = FramedWrite::new(&mut out, HarpCodec::new());
            framed.send(msg.clone()).await.unwrap();
        }
        assert_eq!(out, encode_message(&msg));
    }
}
