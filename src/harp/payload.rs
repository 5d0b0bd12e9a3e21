//! # Typed Payloads
//!
//! Reinterprets raw payload bytes as little-endian scalars and builds
//! messages from scalar values. One generic accessor per direction,
//! parameterized by [`PayloadValue`], covers every register.

use super::protocol::*;
use crate::error::{HarpError, Result};

/// A scalar that can be stored in a Harp payload
pub trait PayloadValue: Copy + Sized {
    /// Payload element type for this scalar
    const BASE_TYPE: BaseType;

    /// Append the little-endian encoding of `self`
    fn write_le(&self, out: &mut Vec<u8>);

    /// Read one element; `bytes` is exactly `BASE_TYPE.size()` long
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_payload_value {
    ($($ty:ty => $base:expr),* $(,)?) => {
        $(
            impl PayloadValue for $ty {
                const BASE_TYPE: BaseType = $base;

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_payload_value! {
    u8 => BaseType::U8,
    i8 => BaseType::S8,
    u16 => BaseType::U16,
    i16 => BaseType::S16,
    u32 => BaseType::U32,
    i32 => BaseType::S32,
    u64 => BaseType::U64,
    i64 => BaseType::S64,
    f32 => BaseType::Float,
}

fn encode_values<T: PayloadValue>(values: &[T]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(values.len() * T::BASE_TYPE.size());
    for value in values {
        value.write_le(&mut payload);
    }
    payload
}

impl HarpMessage {
    /// Create a message holding a single value
    ///
    /// # Examples
    ///
    /// ```
    /// use harp_audioswitch::harp::protocol::{HarpMessage, MessageType};
    ///
    /// let msg = HarpMessage::from_value(33, MessageType::Write, 0x0003u16);
    /// assert_eq!(msg.payload(), &[0x03, 0x00]);
    /// ```
    pub fn from_value<T: PayloadValue>(address: u8, message_type: MessageType, value: T) -> Self {
        let mut payload = Vec::with_capacity(T::BASE_TYPE.size());
        value.write_le(&mut payload);

        // A single element of at most 8 bytes always fits a frame
        Self::new_unchecked(message_type, address, T::BASE_TYPE, payload)
    }

    /// Create a message holding an array of values
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayloadLength` if the array does not fit in a frame
    pub fn from_values<T: PayloadValue>(address: u8, message_type: MessageType, values: &[T]) -> Result<Self> {
        Self::new(message_type, address, DEFAULT_PORT, T::BASE_TYPE, None, encode_values(values))
    }

    /// Create a timestamped message holding a single value
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` if `timestamp` cannot be represented
    pub fn from_value_timestamped<T: PayloadValue>(
        address: u8,
        timestamp: f64,
        message_type: MessageType,
        value: T,
    ) -> Result<Self> {
        Self::from_values_timestamped(address, timestamp, message_type, &[value])
    }

    /// Create a timestamped message holding an array of values
    pub fn from_values_timestamped<T: PayloadValue>(
        address: u8,
        timestamp: f64,
        message_type: MessageType,
        values: &[T],
    ) -> Result<Self> {
        let timestamp = Timestamp::from_secs_f64(timestamp)?;
        Self::new(
            message_type,
            address,
            DEFAULT_PORT,
            T::BASE_TYPE,
            Some(timestamp),
            encode_values(values),
        )
    }

    /// Create a read command; reads carry no payload
    pub fn read_request(address: u8, base_type: BaseType) -> Self {
        Self::new_unchecked(MessageType::Read, address, base_type, Vec::new())
    }

    pub fn from_u8(address: u8, message_type: MessageType, value: u8) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_i8(address: u8, message_type: MessageType, value: i8) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_u16(address: u8, message_type: MessageType, value: u16) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_i16(address: u8, message_type: MessageType, value: i16) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_u32(address: u8, message_type: MessageType, value: u32) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_i32(address: u8, message_type: MessageType, value: i32) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_u64(address: u8, message_type: MessageType, value: u64) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_i64(address: u8, message_type: MessageType, value: i64) -> Self {
        Self::from_value(address, message_type, value)
    }

    pub fn from_f32(address: u8, message_type: MessageType, value: f32) -> Self {
        Self::from_value(address, message_type, value)
    }

    /// First payload element as `T`
    ///
    /// # Errors
    ///
    /// - `PayloadTypeMismatch` if the message's base type is not `T`'s
    /// - `InvalidPayloadLength` if the payload is empty
    pub fn payload_value<T: PayloadValue>(&self) -> Result<T> {
        self.check_base_type(T::BASE_TYPE)?;

        let size = T::BASE_TYPE.size();
        if self.payload().len() < size {
            return Err(HarpError::InvalidPayloadLength(format!(
                "register {} carries no {} value",
                self.address(),
                T::BASE_TYPE
            )));
        }
        Ok(T::read_le(&self.payload()[..size]))
    }

    /// All payload elements as `T`
    pub fn payload_array<T: PayloadValue>(&self) -> Result<Vec<T>> {
        self.check_base_type(T::BASE_TYPE)?;

        Ok(self
            .payload()
            .chunks_exact(T::BASE_TYPE.size())
            .map(T::read_le)
            .collect())
    }

    /// First payload element with the message timestamp
    ///
    /// # Errors
    ///
    /// As [`HarpMessage::payload_value`], plus `TimestampNotPresent`
    pub fn timestamped_payload<T: PayloadValue>(&self) -> Result<Timestamped<T>> {
        let value = self.payload_value::<T>()?;
        let timestamp = self.timestamp().ok_or(HarpError::TimestampNotPresent)?;
        Ok(Timestamped::new(value, timestamp.as_secs_f64()))
    }

    pub fn timestamped_payload_array<T: PayloadValue>(&self) -> Result<Timestamped<Vec<T>>> {
        let values = self.payload_array::<T>()?;
        let timestamp = self.timestamp().ok_or(HarpError::TimestampNotPresent)?;
        Ok(Timestamped::new(values, timestamp.as_secs_f64()))
    }

    pub fn payload_u8(&self) -> Result<u8> {
        self.payload_value()
    }

    pub fn payload_i8(&self) -> Result<i8> {
        self.payload_value()
    }

    pub fn payload_u16(&self) -> Result<u16> {
        self.payload_value()
    }

    pub fn payload_i16(&self) -> Result<i16> {
        self.payload_value()
    }

    pub fn payload_u32(&self) -> Result<u32> {
        self.payload_value()
    }

    pub fn payload_i32(&self) -> Result<i32> {
        self.payload_value()
    }

    pub fn payload_u64(&self) -> Result<u64> {
        self.payload_value()
    }

    pub fn payload_i64(&self) -> Result<i64> {
        self.payload_value()
    }

    pub fn payload_f32(&self) -> Result<f32> {
        self.payload_value()
    }

    pub fn timestamped_payload_u8(&self) -> Result<Timestamped<u8>> {
        self.timestamped_payload()
    }

    pub fn timestamped_payload_u16(&self) -> Result<Timestamped<u16>> {
        self.timestamped_payload()
    }

    pub fn timestamped_payload_u32(&self) -> Result<Timestamped<u32>> {
        self.timestamped_payload()
    }

    pub fn timestamped_payload_f32(&self) -> Result<Timestamped<f32>> {
        self.timestamped_payload()
    }

    fn check_base_type(&self, requested: BaseType) -> Result<()> {
        let actual = self.payload_type().base;
        if actual != requested {
            return Err(HarpError::PayloadTypeMismatch {
                requested: requested.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}
