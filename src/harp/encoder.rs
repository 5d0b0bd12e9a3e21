//! # Harp Message Encoder
//!
//! Serializes Harp messages into wire frames.

use bytes::{BufMut, BytesMut};

use super::checksum::checksum;
use super::protocol::*;

/// Encode a Harp message into a complete frame
///
/// # Arguments
///
/// * `message` - Message to encode
///
/// # Returns
///
/// * `Vec<u8>` - Complete frame: length + type + address + port +
///   payload type + [timestamp] + payload + checksum
///
/// # Examples
///
/// ```
/// use harp_audioswitch::harp::encoder::encode_message;
/// use harp_audioswitch::harp::protocol::{HarpMessage, MessageType};
///
/// let msg = HarpMessage::from_u8(32, MessageType::Write, 0x01);
/// let frame = encode_message(&msg);
/// assert_eq!(frame, vec![0x06, 0x02, 0x20, 0xFF, 0x01, 0x01, 0x29]);
/// ```
pub fn encode_message(message: &HarpMessage) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(message.frame_size());
    encode_into(message, &mut frame);
    frame.to_vec()
}

/// Append the encoded frame of `message` to `dst`
pub fn encode_into(message: &HarpMessage, dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(message.frame_size());

    dst.put_u8(message.length());
    dst.put_u8(message.type_byte());
    dst.put_u8(message.address());
    dst.put_u8(message.port());
    dst.put_u8(message.payload_type().to_byte());

    if let Some(timestamp) = message.timestamp() {
        dst.put_slice(&timestamp.to_bytes());
    }

    dst.put_slice(message.payload());

    // Checksum covers every byte of this frame, length included
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
}
