//! # Harp Protocol Constants and Types
//!
//! Core protocol definitions for Harp register messages.
//!
//! Frame structure:
//! ```text
//! length(1) + type(1) + address(1) + port(1) + payload_type(1)
//!     + [timestamp(6)] + payload(N) + checksum(1)
//! ```

use std::fmt;

use crate::error::{HarpError, Result};

/// Port byte used for host-originated messages
pub const DEFAULT_PORT: u8 = 0xFF;

/// Error flag OR-ed into the message type byte of rejected commands
pub const ERROR_FLAG: u8 = 0x08;

/// Payload type bit: value is signed
pub const PAYLOAD_SIGNED_FLAG: u8 = 0x80;

/// Payload type bit: value is floating point
pub const PAYLOAD_FLOAT_FLAG: u8 = 0x40;

/// Payload type bit: payload region starts with a timestamp
pub const PAYLOAD_TIMESTAMP_FLAG: u8 = 0x10;

/// Payload type bits holding the element size in bytes
pub const PAYLOAD_SIZE_MASK: u8 = 0x0F;

/// Header size after the length byte: type + address + port + payload_type
pub const HEADER_SIZE: usize = 4;

/// Timestamp size: seconds(4) + ticks(2)
pub const TIMESTAMP_SIZE: usize = 6;

/// Smallest possible frame: length(1) + header(4) + checksum(1)
pub const MIN_FRAME_SIZE: usize = 1 + HEADER_SIZE + 1;

/// Smallest legal value of the length byte
pub const MIN_LENGTH_FIELD: usize = MIN_FRAME_SIZE - 1;

/// Largest payload region (timestamp + values) that fits the length byte
pub const MAX_PAYLOAD_REGION: usize = u8::MAX as usize - HEADER_SIZE - 1;

/// Duration of one timestamp tick in seconds (32 µs)
pub const TICK_SECONDS: f64 = 32e-6;

/// Number of ticks in one second
pub const TICKS_PER_SECOND: u32 = 31_250;

/// Message type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Request the value of a register, or the device's reply to it
    Read,
    /// Set the value of a register, or the device's reply to it
    Write,
    /// Asynchronous notification from the device
    Event,
}

impl MessageType {
    /// Wire value without the error flag
    pub fn to_byte(self) -> u8 {
        match self {
            MessageType::Read => 1,
            MessageType::Write => 2,
            MessageType::Event => 3,
        }
    }

    /// Parse a message type byte, returning the type and the error flag
    pub fn from_byte(byte: u8) -> Result<(Self, bool)> {
        let is_error = byte & ERROR_FLAG != 0;
        let message_type = match byte & !ERROR_FLAG {
            1 => MessageType::Read,
            2 => MessageType::Write,
            3 => MessageType::Event,
            _ => return Err(HarpError::InvalidMessageType(byte)),
        };
        Ok((message_type, is_error))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Read => "Read",
            MessageType::Write => "Write",
            MessageType::Event => "Event",
        };
        f.write_str(name)
    }
}

/// Numeric type of the payload elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
    Float,
}

impl BaseType {
    /// All base types, in wire-value order
    pub const ALL: [BaseType; 9] = [
        BaseType::U8,
        BaseType::S8,
        BaseType::U16,
        BaseType::S16,
        BaseType::U32,
        BaseType::S32,
        BaseType::U64,
        BaseType::S64,
        BaseType::Float,
    ];

    /// Wire value without the timestamp flag
    pub fn to_byte(self) -> u8 {
        match self {
            BaseType::U8 => 0x01,
            BaseType::S8 => PAYLOAD_SIGNED_FLAG | 0x01,
            BaseType::U16 => 0x02,
            BaseType::S16 => PAYLOAD_SIGNED_FLAG | 0x02,
            BaseType::U32 => 0x04,
            BaseType::S32 => PAYLOAD_SIGNED_FLAG | 0x04,
            BaseType::U64 => 0x08,
            BaseType::S64 => PAYLOAD_SIGNED_FLAG | 0x08,
            BaseType::Float => PAYLOAD_FLOAT_FLAG | 0x04,
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        (self.to_byte() & PAYLOAD_SIZE_MASK) as usize
    }

    pub fn is_signed(self) -> bool {
        self.to_byte() & PAYLOAD_SIGNED_FLAG != 0
    }

    pub fn is_float(self) -> bool {
        self == BaseType::Float
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BaseType::U8 => "U8",
            BaseType::S8 => "S8",
            BaseType::U16 => "U16",
            BaseType::S16 => "S16",
            BaseType::U32 => "U32",
            BaseType::S32 => "S32",
            BaseType::U64 => "U64",
            BaseType::S64 => "S64",
            BaseType::Float => "Float",
        };
        f.write_str(name)
    }
}

/// Payload type byte: base type plus the timestamp flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadType {
    pub base: BaseType,
    pub has_timestamp: bool,
}

impl PayloadType {
    pub fn new(base: BaseType, has_timestamp: bool) -> Self {
        Self { base, has_timestamp }
    }

    pub fn to_byte(self) -> u8 {
        let flag = if self.has_timestamp { PAYLOAD_TIMESTAMP_FLAG } else { 0 };
        self.base.to_byte() | flag
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        let has_timestamp = byte & PAYLOAD_TIMESTAMP_FLAG != 0;
        let base_byte = byte & !PAYLOAD_TIMESTAMP_FLAG;

        BaseType::ALL
            .iter()
            .copied()
            .find(|base| base.to_byte() == base_byte)
            .map(|base| Self { base, has_timestamp })
            .ok_or(HarpError::InvalidPayloadType(byte))
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_timestamp {
            write!(f, "Timestamped{}", self.base)
        } else {
            write!(f, "{}", self.base)
        }
    }
}

/// Device time: whole seconds plus 32 µs ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: u32,
    pub ticks: u16,
}

impl Timestamp {
    pub fn new(seconds: u32, ticks: u16) -> Self {
        Self { seconds, ticks }
    }

    /// Convert fractional seconds, rounding to the nearest tick
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` for negative, non-finite or
    /// out-of-range values
    pub fn from_secs_f64(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(HarpError::InvalidTimestamp(value));
        }

        let mut seconds = value.floor();
        let mut ticks = ((value - seconds) * TICKS_PER_SECOND as f64).round();
        if ticks >= TICKS_PER_SECOND as f64 {
            seconds += 1.0;
            ticks = 0.0;
        }

        if seconds > u32::MAX as f64 {
            return Err(HarpError::InvalidTimestamp(value));
        }

        Ok(Self {
            seconds: seconds as u32,
            ticks: ticks as u16,
        })
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.ticks as f64 / TICKS_PER_SECOND as f64
    }

    pub fn to_bytes(&self) -> [u8; TIMESTAMP_SIZE] {
        let s = self.seconds.to_le_bytes();
        let t = self.ticks.to_le_bytes();
        [s[0], s[1], s[2], s[3], t[0], t[1]]
    }

    pub fn from_bytes(bytes: [u8; TIMESTAMP_SIZE]) -> Self {
        Self {
            seconds: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            ticks: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// A payload value paired with the device time it was captured at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    pub value: T,
    /// Seconds since device boot
    pub seconds: f64,
}

impl<T> Timestamped<T> {
    pub fn new(value: T, seconds: f64) -> Self {
        Self { value, seconds }
    }

    /// Convert the value, keeping the timestamp
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Timestamped<U> {
        Timestamped {
            value: f(self.value),
            seconds: self.seconds,
        }
    }
}

/// Harp message
///
/// Immutable once constructed. Every constructor checks that the payload
/// length is a whole number of elements and that the frame fits in the
/// one-byte length field, so any `HarpMessage` can be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarpMessage {
    message_type: MessageType,
    is_error: bool,
    address: u8,
    port: u8,
    payload_type: PayloadType,
    timestamp: Option<Timestamp>,
    payload: Vec<u8>,
}

impl HarpMessage {
    /// Create a new Harp message
    ///
    /// # Arguments
    ///
    /// * `message_type` - Read, Write or Event
    /// * `address` - Register address
    /// * `port` - Port byte (`DEFAULT_PORT` for host messages)
    /// * `base_type` - Element type of the payload
    /// * `timestamp` - Optional timestamp; sets the timestamp flag
    /// * `payload` - Raw little-endian payload bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayloadLength` if the payload is not a whole number
    /// of elements or does not fit in a frame
    pub fn new(
        message_type: MessageType,
        address: u8,
        port: u8,
        base_type: BaseType,
        timestamp: Option<Timestamp>,
        payload: Vec<u8>,
    ) -> Result<Self> {
        let payload_type = PayloadType::new(base_type, timestamp.is_some());
        validate_payload_length(payload_type, payload.len())?;

        Ok(Self {
            message_type,
            is_error: false,
            address,
            port,
            payload_type,
            timestamp,
            payload,
        })
    }

    /// Untimestamped host message whose payload is known to be valid
    pub(crate) fn new_unchecked(
        message_type: MessageType,
        address: u8,
        base_type: BaseType,
        payload: Vec<u8>,
    ) -> Self {
        debug_assert!(validate_payload_length(PayloadType::new(base_type, false), payload.len()).is_ok());
        Self {
            message_type,
            is_error: false,
            address,
            port: DEFAULT_PORT,
            payload_type: PayloadType::new(base_type, false),
            timestamp: None,
            payload,
        }
    }

    /// Mark this message as an error reply
    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Whether the device flagged this message as an error reply
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Raw payload bytes, excluding the timestamp
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of payload elements
    pub fn element_count(&self) -> usize {
        self.payload.len() / self.payload_type.base.size()
    }

    /// Value of the length byte
    pub fn length(&self) -> u8 {
        // Bounded by validate_payload_length
        (HEADER_SIZE + self.timestamp_size() + self.payload.len() + 1) as u8
    }

    /// Total encoded size including the length byte
    pub fn frame_size(&self) -> usize {
        self.length() as usize + 1
    }

    pub(crate) fn timestamp_size(&self) -> usize {
        if self.timestamp.is_some() {
            TIMESTAMP_SIZE
        } else {
            0
        }
    }

    pub(crate) fn type_byte(&self) -> u8 {
        let flag = if self.is_error { ERROR_FLAG } else { 0 };
        self.message_type.to_byte() | flag
    }
}

/// Check that a payload length agrees with its payload type
pub(crate) fn validate_payload_length(payload_type: PayloadType, len: usize) -> Result<()> {
    let size = payload_type.base.size();
    if len % size != 0 {
        return Err(HarpError::InvalidPayloadLength(format!(
            "{} bytes is not a whole number of {} elements",
            len, payload_type.base
        )));
    }

    let timestamp = if payload_type.has_timestamp { TIMESTAMP_SIZE } else { 0 };
    if timestamp + len > MAX_PAYLOAD_REGION {
        return Err(HarpError::InvalidPayloadLength(format!(
            "{} bytes exceeds maximum {}",
            timestamp + len,
            MAX_PAYLOAD_REGION
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_bytes() {
        assert_eq!(MessageType::Read.to_byte(), 1);
        assert_eq!(MessageType::Write.to_byte(), 2);
        assert_eq!(MessageType::Event.to_byte(), 3);

        assert_eq!(MessageType::from_byte(2).unwrap(), (MessageType::Write, false));
        assert_eq!(MessageType::from_byte(0x09).unwrap(), (MessageType::Read, true));
        assert_eq!(MessageType::from_byte(0x0A).unwrap(), (MessageType::Write, true));
    }

    #[test]
    fn test_message_type_invalid() {
        for byte in [0x00, 0x04, 0x08, 0x20, 0xFF] {
            assert!(matches!(
                MessageType::from_byte(byte),
                Err(HarpError::InvalidMessageType(b)) if b == byte
            ));
        }
    }

    #[test]
    fn test_payload_type_bytes() {
        assert_eq!(PayloadType::new(BaseType::U8, false).to_byte(), 0x01);
        assert_eq!(PayloadType::new(BaseType::S16, false).to_byte(), 0x82);
        assert_eq!(PayloadType::new(BaseType::Float, false).to_byte(), 0x44);
        assert_eq!(PayloadType::new(BaseType::U16, true).to_byte(), 0x12);
        assert_eq!(PayloadType::new(BaseType::S64, true).to_byte(), 0x98);
    }

    #[test]
    fn test_payload_type_parse_all() {
        for base in BaseType::ALL {
            for has_timestamp in [false, true] {
                let pt = PayloadType::new(base, has_timestamp);
                assert_eq!(PayloadType::from_byte(pt.to_byte()).unwrap(), pt);
            }
        }
    }

    #[test]
    fn test_payload_type_invalid() {
        for byte in [0x00, 0x03, 0x41, 0xC4, 0x20] {
            assert!(PayloadType::from_byte(byte).is_err(), "0x{:02X} should be invalid", byte);
        }
    }

    #[test]
    fn test_base_type_sizes() {
        assert_eq!(BaseType::U8.size(), 1);
        assert_eq!(BaseType::S16.size(), 2);
        assert_eq!(BaseType::U32.size(), 4);
        assert_eq!(BaseType::Float.size(), 4);
        assert_eq!(BaseType::S64.size(), 8);
        assert!(BaseType::S8.is_signed());
        assert!(!BaseType::U64.is_signed());
        assert!(BaseType::Float.is_float());
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = Timestamp::from_secs_f64(12.5).unwrap();
        assert_eq!(ts.seconds, 12);
        assert_eq!(ts.ticks, 15_625);
        assert!((ts.as_secs_f64() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_rounds_up_to_next_second() {
        let ts = Timestamp::from_secs_f64(3.999_999).unwrap();
        assert_eq!(ts, Timestamp::new(4, 0));
    }

    #[test]
    fn test_timestamp_invalid() {
        assert!(Timestamp::from_secs_f64(-1.0).is_err());
        assert!(Timestamp::from_secs_f64(f64::NAN).is_err());
        assert!(Timestamp::from_secs_f64(f64::INFINITY).is_err());
        assert!(Timestamp::from_secs_f64(5_000_000_000.0).is_err());
    }

    #[test]
    fn test_timestamp_bytes() {
        let ts = Timestamp::new(0x0403_0201, 0x0605);
        assert_eq!(ts.to_bytes(), [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(Timestamp::from_bytes(ts.to_bytes()), ts);
    }

    #[test]
    fn test_message_new() {
        let msg = HarpMessage::new(MessageType::Write, 32, DEFAULT_PORT, BaseType::U8, None, vec![1])
            .unwrap();
        assert_eq!(msg.address(), 32);
        assert_eq!(msg.port(), 0xFF);
        assert_eq!(msg.payload_type(), PayloadType::new(BaseType::U8, false));
        assert_eq!(msg.length(), 6);
        assert_eq!(msg.frame_size(), 7);
        assert_eq!(msg.element_count(), 1);
        assert!(!msg.is_error());
    }

    #[test]
    fn test_message_timestamp_sets_flag() {
        let msg = HarpMessage::new(
            MessageType::Event,
            33,
            DEFAULT_PORT,
            BaseType::U16,
            Some(Timestamp::new(1, 0)),
            vec![0x01, 0x00],
        )
        .unwrap();
        assert!(msg.payload_type().has_timestamp);
        assert_eq!(msg.length(), 13);
    }

    #[test]
    fn test_message_partial_element_rejected() {
        let result = HarpMessage::new(MessageType::Write, 33, DEFAULT_PORT, BaseType::U16, None, vec![1]);
        assert!(matches!(result, Err(HarpError::InvalidPayloadLength(_))));
    }

    #[test]
    fn test_message_payload_too_large() {
        let ok = HarpMessage::new(
            MessageType::Write,
            12,
            DEFAULT_PORT,
            BaseType::U8,
            None,
            vec![0; MAX_PAYLOAD_REGION],
        );
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().length(), 255);

        let too_big = HarpMessage::new(
            MessageType::Write,
            12,
            DEFAULT_PORT,
            BaseType::U8,
            Some(Timestamp::new(0, 0)),
            vec![0; MAX_PAYLOAD_REGION],
        );
        assert!(matches!(too_big, Err(HarpError::InvalidPayloadLength(_))));
    }

    #[test]
    fn test_error_flag_in_type_byte() {
        let msg = HarpMessage::new(MessageType::Write, 32, DEFAULT_PORT, BaseType::U8, None, vec![7])
            .unwrap()
            .with_error(true);
        assert_eq!(msg.type_byte(), 0x0A);
    }
}
