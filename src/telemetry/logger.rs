//! JSONL event recorder with file rotation

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::harp::protocol::HarpMessage;
use crate::harp::value::PayloadValues;
use crate::registers::{self, audio_switch};

const FILE_PREFIX: &str = "events_";
const FILE_EXTENSION: &str = "jsonl";

/// One received message, as written to the log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Host wall-clock time, RFC 3339
    pub received_at: String,
    pub message_type: String,
    pub address: u8,
    /// Register name, if the address is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register: Option<&'static str>,
    pub is_error: bool,
    /// Device timestamp in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_seconds: Option<f64>,
    pub payload: PayloadValues,
    /// Named rendering of the value, e.g. enabled channels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EventRecord {
    pub fn from_message(message: &HarpMessage) -> Result<Self> {
        let payload = PayloadValues::from_message(message)?;
        let description = payload
            .first_as_u64()
            .and_then(|raw| audio_switch::describe(message.address(), raw));

        Ok(Self {
            received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message_type: message.message_type().to_string(),
            address: message.address(),
            register: registers::lookup(message.address()).map(|r| r.name),
            is_error: message.is_error(),
            device_seconds: message.timestamp().map(|t| t.as_secs_f64()),
            payload,
            description,
        })
    }
}

/// Writes records to rotating JSONL files
pub struct EventLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    files_created: u64,
}

impl EventLogger {
    /// Create the log directory if needed
    ///
    /// No file is created until the first record is written.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            files_created: 0,
        })
    }

    /// Append one record, rotating first if the current file is full
    pub fn log(&mut self, record: &EventRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record).map_err(std::io::Error::from)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Convert and append a received message
    pub fn log_message(&mut self, message: &HarpMessage) -> Result<()> {
        let record = EventRecord::from_message(message)?;
        self.log(&record)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// File currently being written
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            self.files_created,
            FILE_EXTENSION
        );
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        debug!("Recording events to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.files_created += 1;

        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_log_file(path))
            .collect();

        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        // Names embed creation time, so lexical order is chronological
        files.sort();
        let excess = files.len() - self.max_files_to_keep;
        for path in &files[..excess] {
            match fs::remove_file(path) {
                Ok(()) => info!("Removed old event log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush event log: {}", e);
        }
    }
}

fn is_log_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with(FILE_PREFIX));
    name_matches && path.extension().map_or(false, |ext| ext == FILE_EXTENSION)
}
