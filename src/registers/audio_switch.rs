//! # AudioSwitch Registers
//!
//! Application registers of the Harp AudioSwitch, a 16-channel audio
//! router controlled over USB or from digital inputs.

use std::fmt;

use super::{reg, Access, Register, RegisterDescriptor, RegisterValue};
use crate::error::{HarpError, Result};
use crate::harp::protocol::BaseType;

/// Value of the WhoAmI register on an AudioSwitch
pub const WHO_AM_I: u16 = 1248;

pub const REGISTERS: &[RegisterDescriptor] = &[
    reg!("ControlMode", 32, U8, ReadWrite, "Source that selects the active channels"),
    reg!("EnableChannels", 33, U16, 1, ReadWrite, true, "Bitmask of enabled audio channels"),
    reg!("DigitalInputState", 34, U8, 1, Read, true, "State of digital inputs DI0 to DI4"),
    reg!("DO0State", 35, U8, ReadWrite, "State of digital output DO0"),
    reg!("Reserved0", 36, U8, ReadWrite, "Reserved"),
    reg!("DI4Trigger", 37, U8, ReadWrite, "Function of digital input DI4"),
    reg!("DO0Sync", 38, U8, ReadWrite, "Function of digital output DO0"),
    reg!("EnableEvents", 39, U8, ReadWrite, "Events the device reports"),
];

pub const CONTROL_MODE: Register<ControlSource> = Register::new("ControlMode", 32);
pub const ENABLE_CHANNELS: Register<AudioChannels> = Register::new("EnableChannels", 33);
pub const DIGITAL_INPUT_STATE: Register<DigitalInputs> = Register::new("DigitalInputState", 34);
pub const DO0_STATE: Register<EnableFlag> = Register::new("DO0State", 35);
pub const DI4_TRIGGER: Register<DI4TriggerConfig> = Register::new("DI4Trigger", 37);
pub const DO0_SYNC: Register<DO0SyncConfig> = Register::new("DO0Sync", 38);
pub const ENABLE_EVENTS: Register<AudioSwitchEvents> = Register::new("EnableEvents", 39);

/// Enum stored as a single byte; unknown raw values are rejected
macro_rules! register_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),*
        }

        impl RegisterValue for $name {
            type Raw = u8;

            fn from_raw(register: &'static str, raw: u8) -> Result<Self> {
                match raw {
                    $($value => Ok($name::$variant),)*
                    other => Err(HarpError::InvalidRegisterValue { register, value: other as u64 }),
                }
            }

            fn to_raw(&self) -> u8 {
                *self as u8
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)*
                }
            }
        }
    };
}

register_enum! {
    /// Who selects the enabled channels
    ControlSource { Usb = 0, DigitalInputs = 1 }
}

register_enum! {
    EnableFlag { Disabled = 0, Enabled = 1 }
}

register_enum! {
    /// DI4 is either a plain input or the high address bit in DigitalInputs mode
    DI4TriggerConfig { Input = 0, Address = 1 }
}

register_enum! {
    /// DO0 is either a plain output or toggles on every channel change
    DO0SyncConfig { Output = 0, ToggleOnChannelChange = 1 }
}

/// Bitmask of enabled audio channels, bit n for channel n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioChannels(pub u16);

impl AudioChannels {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u16::MAX);
    pub const COUNT: u8 = 16;

    /// Mask with only `channel` enabled; `None` for channels past 15
    pub fn channel(channel: u8) -> Option<Self> {
        (channel < Self::COUNT).then(|| Self(1 << channel))
    }

    pub fn is_enabled(self, channel: u8) -> bool {
        channel < Self::COUNT && self.0 & (1 << channel) != 0
    }

    /// Enabled channel numbers in ascending order
    pub fn enabled(self) -> Vec<u8> {
        (0..Self::COUNT).filter(|&c| self.is_enabled(c)).collect()
    }
}

impl std::ops::BitOr for AudioChannels {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl RegisterValue for AudioChannels {
    type Raw = u16;

    fn from_raw(_register: &'static str, raw: u16) -> Result<Self> {
        Ok(Self(raw))
    }

    fn to_raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for AudioChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled = self.enabled();
        if enabled.is_empty() {
            return write!(f, "None");
        }
        let names: Vec<String> = enabled.iter().map(|c| format!("Channel{}", c)).collect();
        write!(f, "{}", names.join(" | "))
    }
}

/// Byte-wide flag set with a fixed set of defined bits
macro_rules! register_flags {
    ($(#[$meta:meta])* $name:ident { $($flag:ident = $bit:literal => $label:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u8);

        impl $name {
            pub const NONE: Self = Self(0);
            $(pub const $flag: Self = Self($bit);)*
            pub const MASK: u8 = 0 $(| $bit)*;

            pub fn bits(self) -> u8 {
                self.0
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl RegisterValue for $name {
            type Raw = u8;

            fn from_raw(register: &'static str, raw: u8) -> Result<Self> {
                if raw & !Self::MASK != 0 {
                    return Err(HarpError::InvalidRegisterValue { register, value: raw as u64 });
                }
                Ok(Self(raw))
            }

            fn to_raw(&self) -> u8 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut names = Vec::new();
                $(
                    if self.contains(Self::$flag) {
                        names.push($label);
                    }
                )*
                if names.is_empty() {
                    write!(f, "None")
                } else {
                    write!(f, "{}", names.join(" | "))
                }
            }
        }
    };
}

register_flags! {
    /// Digital input levels, one bit per input
    DigitalInputs {
        DI0 = 0x01 => "DI0",
        DI1 = 0x02 => "DI1",
        DI2 = 0x04 => "DI2",
        DI3 = 0x08 => "DI3",
        DI4 = 0x10 => "DI4",
    }
}

register_flags! {
    /// Event sources reported by the device
    AudioSwitchEvents {
        ENABLE_CHANNELS = 0x01 => "EnableChannels",
        DIGITAL_INPUTS_STATE = 0x02 => "DigitalInputsState",
    }
}

/// Human readable rendering of a raw register value
///
/// Returns `None` for registers without a named value type or for raw
/// values the type does not define.
pub fn describe(address: u8, raw: u64) -> Option<String> {
    fn render<T: RegisterValue + fmt::Display>(register: Register<T>, raw: u64) -> Option<String>
    where
        T::Raw: TryFrom<u64>,
    {
        let raw = <T::Raw as TryFrom<u64>>::try_from(raw).ok()?;
        T::from_raw(register.name, raw).ok().map(|v| v.to_string())
    }

    match address {
        32 => render(CONTROL_MODE, raw),
        33 => render(ENABLE_CHANNELS, raw),
        34 => render(DIGITAL_INPUT_STATE, raw),
        35 => render(DO0_STATE, raw),
        37 => render(DI4_TRIGGER, raw),
        38 => render(DO0_SYNC, raw),
        39 => render(ENABLE_EVENTS, raw),
        _ => None,
    }
}

/// Reject raw values the firmware would refuse for a typed register
///
/// Registers without a named value type accept anything.
pub fn check_value(address: u8, raw: u64) -> Result<()> {
    let typed = matches!(address, 32..=35 | 37..=39);
    match REGISTERS.iter().find(|r| r.address == address) {
        Some(register) if typed && describe(address, raw).is_none() => Err(HarpError::InvalidRegisterValue {
            register: register.name,
            value: raw,
        }),
        _ => Ok(()),
    }
}
