//! # Register Map
//!
//! Describes the registers exposed by a Harp device: the common registers
//! every Harp device implements (addresses 0 to 14) and the AudioSwitch
//! application registers (32 and up).
//!
//! Registers are accessed through [`Register<T>`], which pairs an address
//! with the value type stored there. Conversions between the raw payload
//! scalar and `T` go through [`RegisterValue`].

use std::fmt;
use std::marker::PhantomData;

use crate::error::{HarpError, Result};
use crate::harp::payload::PayloadValue;
use crate::harp::protocol::BaseType;

pub mod audio_switch;

/// Who can modify a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "R"),
            Access::Write => write!(f, "W"),
            Access::ReadWrite => write!(f, "RW"),
        }
    }
}

/// Static description of one register
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub address: u8,
    pub base_type: BaseType,
    /// Number of payload elements
    pub length: usize,
    pub access: Access,
    /// Device sends an Event message when the value changes
    pub emits_events: bool,
    pub description: &'static str,
}

macro_rules! reg {
    ($name:literal, $address:literal, $base:ident, $access:ident, $description:literal) => {
        reg!($name, $address, $base, 1, $access, false, $description)
    };
    ($name:literal, $address:literal, $base:ident, $length:literal, $access:ident, $events:literal, $description:literal) => {
        RegisterDescriptor {
            name: $name,
            address: $address,
            base_type: BaseType::$base,
            length: $length,
            access: Access::$access,
            emits_events: $events,
            description: $description,
        }
    };
}
pub(crate) use reg;

/// Registers shared by every Harp device
pub const COMMON_REGISTERS: &[RegisterDescriptor] = &[
    reg!("WhoAmI", 0, U16, Read, "Device identity"),
    reg!("HardwareVersionHigh", 1, U8, Read, "Major hardware version"),
    reg!("HardwareVersionLow", 2, U8, Read, "Minor hardware version"),
    reg!("AssemblyVersion", 3, U8, Read, "Board assembly version"),
    reg!("CoreVersionHigh", 4, U8, Read, "Major Harp core version"),
    reg!("CoreVersionLow", 5, U8, Read, "Minor Harp core version"),
    reg!("FirmwareVersionHigh", 6, U8, Read, "Major firmware version"),
    reg!("FirmwareVersionLow", 7, U8, Read, "Minor firmware version"),
    reg!("TimestampSeconds", 8, U32, ReadWrite, "Device clock, whole seconds"),
    reg!("TimestampMicroseconds", 9, U16, Read, "Device clock, fractional part in 32 us ticks"),
    reg!("OperationControl", 10, U8, ReadWrite, "Operation mode and status reporting"),
    reg!("ResetDevice", 11, U8, ReadWrite, "Reset or persist register state"),
    reg!("DeviceName", 12, U8, 25, ReadWrite, false, "Zero-padded ASCII device name"),
    reg!("SerialNumber", 13, U16, ReadWrite, "Device serial number"),
    reg!("ClockConfiguration", 14, U8, ReadWrite, "Clock synchronization role"),
];

pub const WHO_AM_I: Register<u16> = Register::new("WhoAmI", 0);
pub const FIRMWARE_VERSION_HIGH: Register<u8> = Register::new("FirmwareVersionHigh", 6);
pub const FIRMWARE_VERSION_LOW: Register<u8> = Register::new("FirmwareVersionLow", 7);
pub const HARDWARE_VERSION_HIGH: Register<u8> = Register::new("HardwareVersionHigh", 1);
pub const HARDWARE_VERSION_LOW: Register<u8> = Register::new("HardwareVersionLow", 2);
pub const SERIAL_NUMBER: Register<u16> = Register::new("SerialNumber", 13);
pub const DEVICE_NAME_ADDRESS: u8 = 12;

/// Every known register, common registers first
pub fn all() -> impl Iterator<Item = &'static RegisterDescriptor> {
    COMMON_REGISTERS.iter().chain(audio_switch::REGISTERS.iter())
}

/// Find a register by address
pub fn lookup(address: u8) -> Option<&'static RegisterDescriptor> {
    all().find(|r| r.address == address)
}

/// Find a register by name (case-insensitive) or by numeric address
///
/// # Examples
///
/// ```
/// use harp_audioswitch::registers;
///
/// assert_eq!(registers::lookup_by_name("enablechannels").unwrap().address, 33);
/// assert_eq!(registers::lookup_by_name("33").unwrap().name, "EnableChannels");
/// assert!(registers::lookup_by_name("Volume").is_err());
/// ```
pub fn lookup_by_name(name: &str) -> Result<&'static RegisterDescriptor> {
    if let Ok(address) = name.parse::<u8>() {
        return lookup(address).ok_or_else(|| HarpError::UnknownRegister(name.to_string()));
    }

    all()
        .find(|r| r.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| HarpError::UnknownRegister(name.to_string()))
}

/// Value stored in a register, convertible from its raw payload scalar
pub trait RegisterValue: Sized {
    type Raw: PayloadValue;

    /// Interpret a raw value read from `register`
    fn from_raw(register: &'static str, raw: Self::Raw) -> Result<Self>;

    fn to_raw(&self) -> Self::Raw;
}

macro_rules! impl_scalar_register_value {
    ($($ty:ty),*) => {
        $(
            impl RegisterValue for $ty {
                type Raw = $ty;

                fn from_raw(_register: &'static str, raw: $ty) -> Result<Self> {
                    Ok(raw)
                }

                fn to_raw(&self) -> $ty {
                    *self
                }
            }
        )*
    };
}

impl_scalar_register_value!(u8, i8, u16, i16, u32, i32, u64, i64, f32);

/// Typed handle to a register: its address and the type of its value
pub struct Register<T> {
    pub name: &'static str,
    pub address: u8,
    _value: PhantomData<fn() -> T>,
}

impl<T> Register<T> {
    pub const fn new(name: &'static str, address: u8) -> Self {
        Self {
            name,
            address,
            _value: PhantomData,
        }
    }
}

impl<T: RegisterValue> Register<T> {
    pub fn base_type(&self) -> BaseType {
        <T::Raw as PayloadValue>::BASE_TYPE
    }

    pub fn descriptor(&self) -> Option<&'static RegisterDescriptor> {
        lookup(self.address)
    }
}

impl<T> Clone for Register<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Register<T> {}

impl<T> fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}
