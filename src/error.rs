//! # Error Types
//!
//! Custom error types for the Harp AudioSwitch crate using `thiserror`.

use thiserror::Error;

/// Main error type for Harp communication
#[derive(Debug, Error)]
pub enum HarpError {
    /// Buffer is smaller than the smallest possible frame
    #[error("Frame too short: {len} bytes (minimum {min})")]
    FrameTooShort { len: usize, min: usize },

    /// Length field disagrees with the number of bytes available
    #[error("Length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Checksum byte does not match the computed sum
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Payload byte count is inconsistent with the payload type
    #[error("Invalid payload length: {0}")]
    InvalidPayloadLength(String),

    /// Text that does not parse as a value of the register's type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Typed accessor used on a message of a different payload type
    #[error("Payload type mismatch: requested {requested}, message carries {actual}")]
    PayloadTypeMismatch { requested: String, actual: String },

    /// Timestamped accessor used on a message without timestamp
    #[error("Timestamp not present in message payload")]
    TimestampNotPresent,

    /// Unknown message type byte
    #[error("Invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    /// Unknown payload type byte
    #[error("Invalid payload type: 0x{0:02X}")]
    InvalidPayloadType(u8),

    /// Timestamp outside the representable range
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    /// Connected device does not report the expected identity
    #[error("Unexpected device identity: expected WhoAmI {expected}, got {actual}")]
    WhoAmIMismatch { expected: u16, actual: u16 },

    /// Device answered a command with an error reply
    #[error("Device rejected {message_type} command on register {address}")]
    DeviceError { address: u8, message_type: String },

    /// No reply within the configured timeout
    #[error("Timed out after {0} ms waiting for reply")]
    Timeout(u64),

    /// Register name or address not present in the register map
    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// Raw register value has no meaning for the register's value type
    #[error("Invalid value {value} for register {register}")]
    InvalidRegisterValue { register: &'static str, value: u64 },

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarpError {
    /// Whether this error describes a corrupt or truncated frame.
    ///
    /// These are recovered locally by the streaming decoder; the session
    /// keeps going after them.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            HarpError::FrameTooShort { .. }
                | HarpError::LengthMismatch { .. }
                | HarpError::ChecksumMismatch { .. }
                | HarpError::InvalidMessageType(_)
                | HarpError::InvalidPayloadType(_)
        )
    }
}

/// Result type alias for Harp operations
pub type Result<T> = std::result::Result<T, HarpError>;
