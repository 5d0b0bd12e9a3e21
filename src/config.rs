//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! below, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::device::DEFAULT_MAX_PENDING_EVENTS;
use crate::error::{HarpError, Result};
use crate::registers::audio_switch;
use crate::serial::HARP_BAUD_RATE;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Reply timeout for each command
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Device identity configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_who_am_i")]
    pub who_am_i: u16,

    /// Refuse to talk to a device reporting another WhoAmI
    #[serde(default = "default_verify_identity")]
    pub verify_identity: bool,

    /// Events held for `next_event` before the oldest are dropped
    #[serde(default = "default_max_pending_events")]
    pub max_pending_events: usize,
}

/// Event recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Record received events to JSONL files
    #[serde(default)]
    pub record: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    /// Value written to EnableEvents when monitoring starts
    #[serde(default = "default_enable_events")]
    pub enable_mask: u8,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write logs to daily files in this directory
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_baud_rate() -> u32 { HARP_BAUD_RATE }
fn default_timeout_ms() -> u64 { 1000 }

fn default_who_am_i() -> u16 { audio_switch::WHO_AM_I }
fn default_verify_identity() -> bool { true }
fn default_max_pending_events() -> usize { DEFAULT_MAX_PENDING_EVENTS }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_enable_events() -> u8 { audio_switch::AudioSwitchEvents::MASK }

fn default_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            who_am_i: default_who_am_i(),
            verify_identity: default_verify_identity(),
            max_pending_events: default_max_pending_events(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            record: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            enable_mask: default_enable_events(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_dir: None,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> HarpError {
    HarpError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use harp_audioswitch::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if ![9600, 57600, 115200, 500_000, 1_000_000, 2_000_000].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 57600, 115200, 500000, 1000000, 2000000",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 1 and 60000"));
        }

        if self.device.max_pending_events == 0 {
            return Err(invalid("max_pending_events must be greater than 0"));
        }

        if self.events.record && self.events.log_dir.is_empty() {
            return Err(invalid("events log_dir cannot be empty when recording"));
        }

        if self.events.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.events.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.events.enable_mask & !audio_switch::AudioSwitchEvents::MASK != 0 {
            return Err(invalid(format!(
                "enable_mask 0x{:02X} sets undefined event bits",
                self.events.enable_mask
            )));
        }

        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(invalid(format!("logging level '{}' is not a valid filter: {}", self.logging.level, e)));
        }

        if matches!(&self.logging.file_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging file_dir cannot be empty"));
        }

        Ok(())
    }

    /// Serial port path, `None` to auto-detect
    pub fn serial_port(&self) -> Option<&str> {
        (!self.serial.port.is_empty()).then_some(self.serial.port.as_str())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.serial.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn expect_config_error(contents: &str, needle: &str) {
        match Config::from_toml(contents) {
            Err(HarpError::Config(e)) => {
                assert!(e.to_string().contains(needle), "'{}' does not mention '{}'", e, needle)
            }
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.serial_port(), None);
        assert_eq!(config.serial.baud_rate, 1_000_000);
        assert_eq!(config.timeout(), std::time::Duration::from_millis(1000));
        assert_eq!(config.device.who_am_i, 1248);
        assert!(config.device.verify_identity);
        assert_eq!(config.device.max_pending_events, DEFAULT_MAX_PENDING_EVENTS);
        assert!(!config.events.record);
        assert_eq!(config.events.enable_mask, 0x03);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file_dir.is_none());
    }

    #[test]
    fn test_default_impl_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [serial]
            port = "/dev/ttyUSB1"
            baud_rate = 1000000
            timeout_ms = 250

            [device]
            who_am_i = 1248
            verify_identity = false
            max_pending_events = 16

            [events]
            record = true
            log_dir = "/tmp/harp"
            max_records_per_file = 500
            max_files_to_keep = 4
            enable_mask = 1

            [logging]
            level = "debug"
            file_dir = "/tmp/harp/diag"
            "#,
        )
        .unwrap();

        assert_eq!(config.serial_port(), Some("/dev/ttyUSB1"));
        assert_eq!(config.serial.timeout_ms, 250);
        assert!(!config.device.verify_identity);
        assert_eq!(config.device.max_pending_events, 16);
        assert!(config.events.record);
        assert_eq!(config.events.max_files_to_keep, 4);
        assert_eq!(config.events.enable_mask, 1);
        assert_eq!(config.logging.file_dir.as_deref(), Some("/tmp/harp/diag"));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml("[serial]\ntimeout_ms = 50\n").unwrap();
        assert_eq!(config.serial.timeout_ms, 50);
        assert_eq!(config.serial.baud_rate, HARP_BAUD_RATE);
        assert_eq!(config.events.max_records_per_file, 10000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        expect_config_error("[serial]\nbaud_rate = 420000\n", "baud_rate");
        expect_config_error("[serial]\ntimeout_ms = 0\n", "timeout_ms");
        expect_config_error("[events]\nrecord = true\nlog_dir = \"\"\n", "log_dir");
        expect_config_error("[events]\nmax_records_per_file = 0\n", "max_records_per_file");
        expect_config_error("[events]\nmax_files_to_keep = 0\n", "max_files_to_keep");
        expect_config_error("[events]\nenable_mask = 4\n", "enable_mask");
        expect_config_error("[device]\nmax_pending_events = 0\n", "max_pending_events");
        expect_config_error("[logging]\nlevel = \"harp_audioswitch=loud\"\n", "level");
        expect_config_error("[logging]\nfile_dir = \"\"\n", "file_dir");
    }

    #[test]
    fn test_logging_level_accepts_filter_directives() {
        let config = Config::from_toml("[logging]\nlevel = \"info,harp_audioswitch=debug\"\n").unwrap();
        assert_eq!(config.logging.level, "info,harp_audioswitch=debug");
        assert!(Config::from_toml("[logging]\nlevel = \"WARN\"\n").is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(Config::from_toml("[serial\n"), Err(HarpError::Config(_))));
        assert!(matches!(
            Config::from_toml("[device]\nwho_am_i = 70000\n"),
            Err(HarpError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[device]\nwho_am_i = 1216").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.device.who_am_i, 1216);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/harp.toml"),
            Err(HarpError::Io(_))
        ));
    }
}
