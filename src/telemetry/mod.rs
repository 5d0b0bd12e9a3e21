//! # Telemetry Module
//!
//! Records messages received from the device to JSONL files with rotation.
//!
//! Each line is one [`logger::EventRecord`]. A file holds at most
//! `max_records_per_file` records and only the newest `max_files_to_keep`
//! files are retained.

pub mod logger;

pub use logger::{EventLogger, EventRecord};
