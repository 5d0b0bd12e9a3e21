//! # Serial Communication Module
//!
//! Opens the USB serial link to a Harp device.
//!
//! Harp devices enumerate as USB CDC or FTDI adapters and talk at
//! 1,000,000 baud, 8 data bits, no parity, one stop bit.

pub mod port_trait;

use async_trait::async_trait;
use std::io;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{HarpError, Result};
pub use port_trait::{SerialPortIO, TokioSerialPort};

/// Harp serial baud rate
pub const HARP_BAUD_RATE: u32 = 1_000_000;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // FTDI adapters used by most Harp boards
    "/dev/ttyACM0", // USB CDC devices
];

/// Serial connection to a Harp device
pub struct HarpSerial {
    port: TokioSerialPort,
    device_path: String,
}

impl std::fmt::Debug for HarpSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarpSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl HarpSerial {
    /// Open a specific device
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use harp_audioswitch::serial::{HarpSerial, HARP_BAUD_RATE};
    ///
    /// let serial = HarpSerial::open("/dev/ttyUSB0", HARP_BAUD_RATE)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        info!("Opened Harp device at {} ({} baud)", path, baud_rate);
        Ok(Self {
            port: TokioSerialPort::new(port),
            device_path: path.to_string(),
        })
    }

    /// Open the first device path that works
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open(path, baud_rate) {
                Ok(serial) => return Ok(serial),
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(HarpError::SerialPortNotFound(paths.join(", ")))
    }

    /// Auto-detect a device on the default paths
    pub fn open_default() -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, HARP_BAUD_RATE)
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| HarpError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl SerialPortIO for HarpSerial {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }
}
