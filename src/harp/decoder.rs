//! # Harp Message Decoder
//!
//! Parses a single complete wire frame back into a [`HarpMessage`].

use super::checksum;
use super::protocol::*;
use crate::error::{HarpError, Result};

/// Decode a complete Harp frame
///
/// # Arguments
///
/// * `frame` - Exactly one frame (length byte through checksum)
///
/// # Returns
///
/// * `Result<HarpMessage>` - Decoded message, or error if invalid
///
/// # Errors
///
/// Validation runs in order and stops at the first failure:
/// 1. `FrameTooShort` if fewer than `MIN_FRAME_SIZE` bytes
/// 2. `LengthMismatch` if the length byte disagrees with the buffer size
/// 3. `ChecksumMismatch` if the checksum byte is wrong
///
/// Field errors follow: `InvalidMessageType`, `InvalidPayloadType`, and
/// `InvalidPayloadLength` when the payload region does not match the
/// payload type.
pub fn decode_message(frame: &[u8]) -> Result<HarpMessage> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(HarpError::FrameTooShort {
            len: frame.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    let declared = frame[0] as usize;
    if declared != frame.len() - 1 {
        return Err(HarpError::LengthMismatch {
            declared,
            actual: frame.len() - 1,
        });
    }

    if let Err((expected, actual)) = checksum::verify(frame) {
        return Err(HarpError::ChecksumMismatch { expected, actual });
    }

    let (message_type, is_error) = MessageType::from_byte(frame[1])?;
    let address = frame[2];
    let port = frame[3];
    let payload_type = PayloadType::from_byte(frame[4])?;

    // Everything between the header and the checksum
    let mut body = &frame[1 + HEADER_SIZE..frame.len() - 1];

    let timestamp = if payload_type.has_timestamp {
        if body.len() < TIMESTAMP_SIZE {
            return Err(HarpError::InvalidPayloadLength(format!(
                "timestamped frame carries only {} payload bytes",
                body.len()
            )));
        }
        let mut raw = [0u8; TIMESTAMP_SIZE];
        raw.copy_from_slice(&body[..TIMESTAMP_SIZE]);
        body = &body[TIMESTAMP_SIZE..];
        Some(Timestamp::from_bytes(raw))
    } else {
        None
    };

    let message = HarpMessage::new(
        message_type,
        address,
        port,
        payload_type.base,
        timestamp,
        body.to_vec(),
    )?;

    Ok(message.with_error(is_error))
}
