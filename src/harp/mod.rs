//! # Harp Protocol Module
//!
//! Binary message format used by Harp devices over USB serial.
//!
//! Frame layout:
//! ```text
//! [length][type][address][port][payload type]{timestamp}[payload][checksum]
//! ```
//!
//! - `length` counts every byte after itself
//! - `timestamp` is present only when the payload type carries the
//!   timestamp flag (u32 seconds + u16 ticks of 32 µs)
//! - `checksum` is the sum of all preceding bytes modulo 256

pub mod checksum;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod payload;
pub mod protocol;
pub mod stream;
pub mod value;

pub use codec::HarpCodec;
pub use decoder::decode_message;
pub use encoder::encode_message;
pub use payload::PayloadValue;
pub use protocol::{BaseType, HarpMessage, MessageType, PayloadType, Timestamp, Timestamped};
pub use stream::FrameDecoder;
pub use value::PayloadValues;
