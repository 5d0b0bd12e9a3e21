//! # Harp AudioSwitch
//!
//! Command-line host for the Harp AudioSwitch.
//!
//! Inspects and changes device registers over USB serial, monitors the
//! events the device emits and decodes raw Harp captures.
//!
//! # Examples
//!
//! ```bash
//! harp-audioswitch info
//! harp-audioswitch write EnableChannels 0x0003
//! harp-audioswitch --config config/default.toml monitor --record
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use harp_audioswitch::config::{Config, LoggingConfig};
use harp_audioswitch::harp::protocol::HarpMessage;
use harp_audioswitch::harp::value::PayloadValues;
use harp_audioswitch::harp::HarpCodec;
use harp_audioswitch::registers::{self, audio_switch};
use harp_audioswitch::serial::{HarpSerial, DEFAULT_DEVICE_PATHS};
use harp_audioswitch::telemetry::EventLogger;
use harp_audioswitch::HarpDevice;

#[derive(Debug, Parser)]
#[command(name = "harp-audioswitch", version, about = "Harp AudioSwitch host tool")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configuration
    #[arg(short, long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show device identity and versions
    Info,
    /// List the register map
    Registers,
    /// Read a register by name or address
    Read { register: String },
    /// Write a register; arrays take comma-separated values
    Write { register: String, value: String },
    /// Print events until Ctrl+C
    Monitor {
        /// Record events to JSONL files
        #[arg(long)]
        record: bool,
    },
    /// Decode a raw capture of Harp frames
    Decode { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }

    let _log_guard = init_logging(&config.logging);
    debug!("Harp AudioSwitch v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Info => info_command(&config).await,
        Command::Registers => {
            print_registers();
            Ok(())
        }
        Command::Read { register } => read_command(&config, &register).await,
        Command::Write { register, value } => write_command(&config, &register, &value).await,
        Command::Monitor { record } => monitor_command(&config, record || config.events.record).await,
        Command::Decode { input } => decode_command(&input).await,
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned
/// guard must live until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "harp-audioswitch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

async fn connect(config: &Config) -> Result<HarpDevice<HarpSerial>> {
    let serial = match config.serial_port() {
        Some(path) => HarpSerial::open(path, config.serial.baud_rate)?,
        None => HarpSerial::open_with_paths(DEFAULT_DEVICE_PATHS, config.serial.baud_rate)?,
    };
    info!("Serial port opened at: {}", serial.device_path());

    let device = if config.device.verify_identity {
        HarpDevice::open(serial, config.device.who_am_i, config.timeout()).await?
    } else {
        HarpDevice::new(serial, config.timeout())
    };
    Ok(device.with_max_pending_events(config.device.max_pending_events))
}

async fn info_command(config: &Config) -> Result<()> {
    let mut device = connect(config).await?;

    let who_am_i = device.who_am_i().await?;
    let hardware = (
        device.read_register(registers::HARDWARE_VERSION_HIGH).await?,
        device.read_register(registers::HARDWARE_VERSION_LOW).await?,
    );
    let firmware = (
        device.read_register(registers::FIRMWARE_VERSION_HIGH).await?,
        device.read_register(registers::FIRMWARE_VERSION_LOW).await?,
    );
    let serial_number = device.read_register(registers::SERIAL_NUMBER).await?;
    let name = device.read_array::<u8>(registers::DEVICE_NAME_ADDRESS).await?;
    let name = String::from_utf8_lossy(&name).trim_end_matches('\0').to_string();

    println!("Device:        {}", name);
    println!("WhoAmI:        {}", who_am_i);
    println!("Hardware:      {}.{}", hardware.0, hardware.1);
    println!("Firmware:      {}.{}", firmware.0, firmware.1);
    println!("Serial number: {}", serial_number);
    println!("Control mode:  {}", device.read_register(audio_switch::CONTROL_MODE).await?);
    println!("Channels:      {}", device.read_register(audio_switch::ENABLE_CHANNELS).await?);
    Ok(())
}

fn print_registers() {
    println!("{:>4}  {:<22} {:<6} {:>3}  {:<3} {:<6} Description", "Addr", "Name", "Type", "Len", "Acc", "Events");
    for register in registers::all() {
        println!(
            "{:>4}  {:<22} {:<6} {:>3}  {:<3} {:<6} {}",
            register.address,
            register.name,
            register.base_type.to_string(),
            register.length,
            register.access.to_string(),
            if register.emits_events { "yes" } else { "" },
            register.description
        );
    }
}

async fn read_command(config: &Config, name: &str) -> Result<()> {
    let register = registers::lookup_by_name(name)?;
    let mut device = connect(config).await?;

    let values = device.read_values(register).await?;
    println!("{} = {}{}", register.name, values, describe_suffix(register.address, &values));
    Ok(())
}

async fn write_command(config: &Config, name: &str, value: &str) -> Result<()> {
    let register = registers::lookup_by_name(name)?;
    if !register.access.is_writable() {
        bail!("Register {} is read-only", register.name);
    }

    let values = PayloadValues::parse(register.base_type, value)?;
    if let Some(raw) = values.first_as_u64() {
        audio_switch::check_value(register.address, raw)?;
    }

    let mut device = connect(config).await?;
    device.write_values(register.address, &values).await?;
    info!("Wrote {} to {}", values, register.name);
    Ok(())
}

async fn monitor_command(config: &Config, record: bool) -> Result<()> {
    let mut device = connect(config).await?;

    let mut logger = if record {
        let logger = EventLogger::new(
            &config.events.log_dir,
            config.events.max_records_per_file,
            config.events.max_files_to_keep,
        )?;
        info!("Recording events to {}", config.events.log_dir);
        Some(logger)
    } else {
        None
    };

    device.write(audio_switch::ENABLE_EVENTS.address, config.events.enable_mask).await?;
    info!("Monitoring events, press Ctrl+C to exit");

    let mut event_count: u64 = 0;
    loop {
        tokio::select! {
            event = device.next_event() => {
                let event = event?;
                event_count += 1;
                println!("{}", format_message(&event));

                if let Some(logger) = logger.as_mut() {
                    if let Err(e) = logger.log_message(&event) {
                        warn!("Failed to record event: {}", e);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(logger) = logger.as_mut() {
        logger.flush()?;
    }
    let stats = device.stats();
    info!(
        "Received {} events ({} malformed frames, {} bytes discarded)",
        event_count, stats.errors, stats.bytes_discarded
    );
    Ok(())
}

async fn decode_command(input: &Path) -> Result<()> {
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut frames = FramedRead::new(file, HarpCodec::new());

    while let Some(message) = frames.next().await {
        println!("{}", format_message(&message?));
    }

    let stats = frames.decoder().stats();
    info!(
        "Decoded {} frames ({} malformed, {} bytes discarded)",
        stats.frames, stats.errors, stats.bytes_discarded
    );
    Ok(())
}

fn describe_suffix(address: u8, values: &PayloadValues) -> String {
    values
        .first_as_u64()
        .and_then(|raw| audio_switch::describe(address, raw))
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// One-line rendering of a message for the terminal
fn format_message(message: &HarpMessage) -> String {
    let register = registers::lookup(message.address())
        .map(|r| r.name.to_string())
        .unwrap_or_else(|| format!("Register{}", message.address()));
    let time = message
        .timestamp()
        .map(|t| format!("[{:>12.6}] ", t.as_secs_f64()))
        .unwrap_or_default();
    let error = if message.is_error() { " ERROR" } else { "" };

    match PayloadValues::from_message(message) {
        Ok(values) => format!(
            "{}{} {}{} = {}{}",
            time,
            message.message_type(),
            register,
            error,
            values,
            describe_suffix(message.address(), &values)
        ),
        Err(e) => format!("{}{} {}{}: {}", time, message.message_type(), register, error, e),
    }
}
