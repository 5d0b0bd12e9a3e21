//! # Harp Device
//!
//! Request/reply session with a Harp device over any [`SerialPortIO`].
//!
//! Every command is answered by a message with the same address and
//! message type. Event messages the device emits while a command is in
//! flight are queued and handed out by [`HarpDevice::next_event`]. The
//! queue is bounded; once full, the oldest event is dropped.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{HarpError, Result};
use crate::harp::encoder::encode_message;
use crate::harp::payload::PayloadValue;
use crate::harp::protocol::{HarpMessage, MessageType, Timestamped};
use crate::harp::stream::{DecoderStats, FrameDecoder};
use crate::harp::value::PayloadValues;
use crate::registers::{self, Register, RegisterDescriptor, RegisterValue};
use crate::serial::SerialPortIO;

/// Default time to wait for a reply
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on events queued during commands
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 256;

const READ_CHUNK_SIZE: usize = 256;

/// Connected Harp device
pub struct HarpDevice<P: SerialPortIO> {
    port: P,
    decoder: FrameDecoder,
    events: VecDeque<HarpMessage>,
    max_pending_events: usize,
    dropped_events: u64,
    timeout: Duration,
}

impl<P: SerialPortIO> HarpDevice<P> {
    /// Wrap a port without checking the device identity
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            decoder: FrameDecoder::new(),
            events: VecDeque::new(),
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
            dropped_events: 0,
            timeout,
        }
    }

    /// Bound the event queue, at least one event is always kept
    pub fn with_max_pending_events(mut self, max: usize) -> Self {
        self.max_pending_events = max.max(1);
        while self.events.len() > self.max_pending_events {
            self.events.pop_front();
            self.dropped_events += 1;
        }
        self
    }

    /// Connect and verify that the device reports `expected_who_am_i`
    ///
    /// # Errors
    ///
    /// - `WhoAmIMismatch` if another kind of device answers
    /// - `Timeout` if nothing answers
    pub async fn open(port: P, expected_who_am_i: u16, timeout: Duration) -> Result<Self> {
        let mut device = Self::new(port, timeout);

        let who_am_i = device.who_am_i().await?;
        if who_am_i != expected_who_am_i {
            return Err(HarpError::WhoAmIMismatch {
                expected: expected_who_am_i,
                actual: who_am_i,
            });
        }

        info!("Connected to Harp device (WhoAmI {})", who_am_i);
        Ok(device)
    }

    pub async fn who_am_i(&mut self) -> Result<u16> {
        self.read_register(registers::WHO_AM_I).await
    }

    /// Send a request and wait for its reply
    ///
    /// Unrelated messages received meanwhile are queued as events.
    ///
    /// # Errors
    ///
    /// - `DeviceError` if the reply carries the error flag
    /// - `Timeout` if no reply arrives within the device timeout
    pub async fn command(&mut self, request: &HarpMessage) -> Result<HarpMessage> {
        self.send(request).await?;

        let address = request.address();
        let message_type = request.message_type();
        let timeout_ms = self.timeout.as_millis() as u64;

        let reply = tokio::time::timeout(self.timeout, self.wait_reply(address, message_type))
            .await
            .map_err(|_| HarpError::Timeout(timeout_ms))??;

        if reply.is_error() {
            return Err(HarpError::DeviceError {
                address,
                message_type: message_type.to_string(),
            });
        }
        Ok(reply)
    }

    /// Write a message without waiting for any reply
    pub async fn send(&mut self, message: &HarpMessage) -> Result<()> {
        let frame = encode_message(message);

        self.port
            .write_all(&frame)
            .await
            .map_err(|e| HarpError::Serial(format!("Failed to write frame: {}", e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| HarpError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} to register {} ({} bytes)", message.message_type(), message.address(), frame.len());
        Ok(())
    }

    /// Read a single value
    pub async fn read<T: PayloadValue>(&mut self, address: u8) -> Result<T> {
        let reply = self.command(&HarpMessage::read_request(address, T::BASE_TYPE)).await?;
        reply.payload_value()
    }

    /// Read a single value with the device timestamp of the reply
    pub async fn read_timestamped<T: PayloadValue>(&mut self, address: u8) -> Result<Timestamped<T>> {
        let reply = self.command(&HarpMessage::read_request(address, T::BASE_TYPE)).await?;
        reply.timestamped_payload()
    }

    /// Read every element of an array register
    pub async fn read_array<T: PayloadValue>(&mut self, address: u8) -> Result<Vec<T>> {
        let reply = self.command(&HarpMessage::read_request(address, T::BASE_TYPE)).await?;
        reply.payload_array()
    }

    /// Read a register whose type is only known from its descriptor
    pub async fn read_values(&mut self, register: &RegisterDescriptor) -> Result<PayloadValues> {
        let reply = self
            .command(&HarpMessage::read_request(register.address, register.base_type))
            .await?;
        PayloadValues::from_message(&reply)
    }

    pub async fn write<T: PayloadValue>(&mut self, address: u8, value: T) -> Result<()> {
        self.command(&HarpMessage::from_value(address, MessageType::Write, value))
            .await?;
        Ok(())
    }

    pub async fn write_values(&mut self, address: u8, values: &PayloadValues) -> Result<()> {
        self.command(&values.to_message(address, MessageType::Write)?).await?;
        Ok(())
    }

    pub async fn read_register<T: RegisterValue>(&mut self, register: Register<T>) -> Result<T> {
        let raw = self.read::<T::Raw>(register.address).await?;
        T::from_raw(register.name, raw)
    }

    pub async fn write_register<T: RegisterValue>(&mut self, register: Register<T>, value: T) -> Result<()> {
        self.write(register.address, value.to_raw()).await
    }

    /// Next event from the device, waiting if none is queued
    ///
    /// Stray replies that arrive outside a command are discarded.
    pub async fn next_event(&mut self) -> Result<HarpMessage> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }

        loop {
            let message = self.receive().await?;
            if message.message_type() == MessageType::Event {
                return Ok(message);
            }
            debug!("Discarding unsolicited {} reply from register {}", message.message_type(), message.address());
        }
    }

    /// Events received during commands and not yet consumed
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Events discarded because the queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    async fn wait_reply(&mut self, address: u8, message_type: MessageType) -> Result<HarpMessage> {
        loop {
            let message = self.receive().await?;
            if message.address() == address && message.message_type() == message_type {
                return Ok(message);
            }

            if message.message_type() == MessageType::Event {
                self.queue_event(message);
            } else {
                debug!(
                    "Ignoring {} reply from register {} while waiting for register {}",
                    message.message_type(),
                    message.address(),
                    address
                );
            }
        }
    }

    fn queue_event(&mut self, event: HarpMessage) {
        if self.events.len() >= self.max_pending_events {
            if let Some(oldest) = self.events.pop_front() {
                self.dropped_events += 1;
                warn!(
                    "Event queue full ({} events), dropped event from register {}",
                    self.max_pending_events,
                    oldest.address()
                );
            }
        }
        self.events.push_back(event);
    }

    /// Next well-formed message from the port
    async fn receive(&mut self) -> Result<HarpMessage> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        loop {
            while let Some(result) = self.decoder.next_frame() {
                match result {
                    Ok(message) => return Ok(message),
                    Err(e) => warn!("Dropped malformed frame: {}", e),
                }
            }

            let n = self
                .port
                .read(&mut buf)
                .await
                .map_err(|e| HarpError::Serial(format!("Failed to read from serial port: {}", e)))?;
            if n == 0 {
                return Err(HarpError::Serial("Serial port closed".to_string()));
            }
            self.decoder.extend(&buf[..n]);
        }
    }
}

impl<P: SerialPortIO> std::fmt::Debug for HarpDevice<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarpDevice")
            .field("timeout", &self.timeout)
            .field("pending_events", &self.events.len())
            .field("max_pending_events", &self.max_pending_events)
            .field("dropped_events", &self.dropped_events)
            .finish_non_exhaustive()
    }
}
