//! # Harp AudioSwitch Library
//!
//! Host-side driver for the Harp AudioSwitch, a USB audio channel router.
//!
//! This library provides the Harp binary message codec, the AudioSwitch
//! register map and an async request/reply session over a serial port.

pub mod config;
pub mod device;
pub mod error;
pub mod harp;
pub mod registers;
pub mod serial;
pub mod telemetry;

pub use device::HarpDevice;
pub use error::{HarpError, Result};
