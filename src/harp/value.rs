//! # Dynamic Payload Values
//!
//! Payload contents when the element type is only known at runtime, e.g.
//! from a register descriptor or a command-line argument.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::payload::PayloadValue;
use super::protocol::*;
use crate::error::{HarpError, Result};

/// Payload elements tagged with their base type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values")]
pub enum PayloadValues {
    U8(Vec<u8>),
    S8(Vec<i8>),
    U16(Vec<u16>),
    S16(Vec<i16>),
    U32(Vec<u32>),
    S32(Vec<i32>),
    U64(Vec<u64>),
    S64(Vec<i64>),
    Float(Vec<f32>),
}

impl PayloadValues {
    /// Read every payload element of `message`
    pub fn from_message(message: &HarpMessage) -> Result<Self> {
        Ok(match message.payload_type().base {
            BaseType::U8 => PayloadValues::U8(message.payload_array()?),
            BaseType::S8 => PayloadValues::S8(message.payload_array()?),
            BaseType::U16 => PayloadValues::U16(message.payload_array()?),
            BaseType::S16 => PayloadValues::S16(message.payload_array()?),
            BaseType::U32 => PayloadValues::U32(message.payload_array()?),
            BaseType::S32 => PayloadValues::S32(message.payload_array()?),
            BaseType::U64 => PayloadValues::U64(message.payload_array()?),
            BaseType::S64 => PayloadValues::S64(message.payload_array()?),
            BaseType::Float => PayloadValues::Float(message.payload_array()?),
        })
    }

    /// Parse comma-separated numbers as elements of `base_type`
    ///
    /// Integers may be written in decimal or with a `0x` prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use harp_audioswitch::harp::protocol::BaseType;
    /// use harp_audioswitch::harp::value::PayloadValues;
    ///
    /// let values = PayloadValues::parse(BaseType::U16, "0x8001").unwrap();
    /// assert_eq!(values, PayloadValues::U16(vec![0x8001]));
    /// ```
    pub fn parse(base_type: BaseType, text: &str) -> Result<Self> {
        Ok(match base_type {
            BaseType::U8 => PayloadValues::U8(parse_list(text, u8::from_str_radix)?),
            BaseType::S8 => PayloadValues::S8(parse_list(text, i8::from_str_radix)?),
            BaseType::U16 => PayloadValues::U16(parse_list(text, u16::from_str_radix)?),
            BaseType::S16 => PayloadValues::S16(parse_list(text, i16::from_str_radix)?),
            BaseType::U32 => PayloadValues::U32(parse_list(text, u32::from_str_radix)?),
            BaseType::S32 => PayloadValues::S32(parse_list(text, i32::from_str_radix)?),
            BaseType::U64 => PayloadValues::U64(parse_list(text, u64::from_str_radix)?),
            BaseType::S64 => PayloadValues::S64(parse_list(text, i64::from_str_radix)?),
            BaseType::Float => PayloadValues::Float(
                text.split(',')
                    .map(|item| {
                        f32::from_str(item.trim())
                            .map_err(|_| HarpError::InvalidValue(format!("'{}' is not a Float", item.trim())))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    pub fn base_type(&self) -> BaseType {
        match self {
            PayloadValues::U8(_) => BaseType::U8,
            PayloadValues::S8(_) => BaseType::S8,
            PayloadValues::U16(_) => BaseType::U16,
            PayloadValues::S16(_) => BaseType::S16,
            PayloadValues::U32(_) => BaseType::U32,
            PayloadValues::S32(_) => BaseType::S32,
            PayloadValues::U64(_) => BaseType::U64,
            PayloadValues::S64(_) => BaseType::S64,
            PayloadValues::Float(_) => BaseType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PayloadValues::U8(v) => v.len(),
            PayloadValues::S8(v) => v.len(),
            PayloadValues::U16(v) => v.len(),
            PayloadValues::S16(v) => v.len(),
            PayloadValues::U32(v) => v.len(),
            PayloadValues::S32(v) => v.len(),
            PayloadValues::U64(v) => v.len(),
            PayloadValues::S64(v) => v.len(),
            PayloadValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First element widened to `u64`, if it is a non-negative integer
    pub fn first_as_u64(&self) -> Option<u64> {
        match self {
            PayloadValues::U8(v) => v.first().map(|&x| x as u64),
            PayloadValues::S8(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            PayloadValues::U16(v) => v.first().map(|&x| x as u64),
            PayloadValues::S16(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            PayloadValues::U32(v) => v.first().map(|&x| x as u64),
            PayloadValues::S32(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            PayloadValues::U64(v) => v.first().copied(),
            PayloadValues::S64(v) => v.first().and_then(|&x| u64::try_from(x).ok()),
            PayloadValues::Float(_) => None,
        }
    }

    /// Build a message carrying these values
    pub fn to_message(&self, address: u8, message_type: MessageType) -> Result<HarpMessage> {
        match self {
            PayloadValues::U8(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::S8(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::U16(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::S16(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::U32(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::S32(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::U64(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::S64(v) => HarpMessage::from_values(address, message_type, v),
            PayloadValues::Float(v) => HarpMessage::from_values(address, message_type, v),
        }
    }
}

fn parse_list<T, E>(text: &str, from_str_radix: fn(&str, u32) -> std::result::Result<T, E>) -> Result<Vec<T>>
where
    T: PayloadValue,
{
    text.split(',')
        .map(|item| {
            let item = item.trim();
            let parsed = match item.strip_prefix("0x").or_else(|| item.strip_prefix("0X")) {
                Some(hex) => from_str_radix(hex, 16),
                None => from_str_radix(item, 10),
            };
            parsed.map_err(|_| {
                HarpError::InvalidValue(format!("'{}' is not a valid {}", item, T::BASE_TYPE))
            })
        })
        .collect()
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    if values.len() == 1 {
        return write!(f, "{}", values[0]);
    }

    write!(f, "[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", value)?;
    }
    write!(f, "]")
}

impl fmt::Display for PayloadValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValues::U8(v) => write_list(f, v),
            PayloadValues::S8(v) => write_list(f, v),
            PayloadValues::U16(v) => write_list(f, v),
            PayloadValues::S16(v) => write_list(f, v),
            PayloadValues::U32(v) => write_list(f, v),
            PayloadValues::S32(v) => write_list(f, v),
            PayloadValues::U64(v) => write_list(f, v),
            PayloadValues::S64(v) => write_list(f, v),
            PayloadValues::Float(v) => write_list(f, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message() {
        let msg = HarpMessage::from_values(13, MessageType::Read, &[1u16, 2]).unwrap();
        assert_eq!(PayloadValues::from_message(&msg).unwrap(), PayloadValues::U16(vec![1, 2]));

        let msg = HarpMessage::from_f32(40, MessageType::Read, 0.5);
        assert_eq!(PayloadValues::from_message(&msg).unwrap(), PayloadValues::Float(vec![0.5]));
    }

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!(PayloadValues::parse(BaseType::U8, "17").unwrap(), PayloadValues::U8(vec![17]));
        assert_eq!(PayloadValues::parse(BaseType::U16, "0xFFFF").unwrap(), PayloadValues::U16(vec![0xFFFF]));
        assert_eq!(PayloadValues::parse(BaseType::S16, "-3, 4").unwrap(), PayloadValues::S16(vec![-3, 4]));
        assert_eq!(PayloadValues::parse(BaseType::Float, "1.5").unwrap(), PayloadValues::Float(vec![1.5]));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(PayloadValues::parse(BaseType::U8, "256"), Err(HarpError::InvalidValue(_))));
        assert!(matches!(PayloadValues::parse(BaseType::U16, "-1"), Err(HarpError::InvalidValue(_))));
        assert!(matches!(PayloadValues::parse(BaseType::Float, "1.5.2"), Err(HarpError::InvalidValue(_))));

        match PayloadValues::parse(BaseType::U32, "abc") {
            Err(e) => assert_eq!(e.to_string(), "Invalid value: 'abc' is not a valid U32"),
            other => panic!("Expected InvalidValue, got: {:?}", other),
        }
    }

    #[test]
    fn test_to_message_round_trip() {
        let values = PayloadValues::parse(BaseType::U16, "0x000F").unwrap();
        let msg = values.to_message(33, MessageType::Write).unwrap();
        assert_eq!(msg.payload(), &[0x0F, 0x00]);
        assert_eq!(PayloadValues::from_message(&msg).unwrap(), values);
    }

    #[test]
    fn test_display() {
        assert_eq!(PayloadValues::U8(vec![3]).to_string(), "3");
        assert_eq!(PayloadValues::S16(vec![-1, 2]).to_string(), "[-1, 2]");
        assert_eq!(PayloadValues::U8(vec![]).to_string(), "[]");
    }

    #[test]
    fn test_first_as_u64() {
        assert_eq!(PayloadValues::U16(vec![1248]).first_as_u64(), Some(1248));
        assert_eq!(PayloadValues::S8(vec![-1]).first_as_u64(), None);
        assert_eq!(PayloadValues::Float(vec![1.0]).first_as_u64(), None);
        assert_eq!(PayloadValues::U8(vec![]).first_as_u64(), None);
    }

    #[test]
    fn test_serialize_json() {
        let json = serde_json::to_string(&PayloadValues::U16(vec![3])).unwrap();
        assert_eq!(json, r#"{"type":"U16","values":[3]}"#);
    }
}
