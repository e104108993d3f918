#![warn(missing_docs)]
//! Test and recording surfaces: a scripted UDP server and a JSONL event sink.

mod fake_server;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub use fake_server::FakeServer;

/// One line of an event log.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a, T: Serialize> {
    /// RFC 3339 wall-clock time the event was recorded.
    pub timestamp: String,
    /// Short kind label.
    pub kind: &'a str,
    /// Event body.
    pub payload: &'a T,
}

impl<'a, T: Serialize> EventRecord<'a, T> {
    /// Stamp `payload` with the current time.
    pub fn now(kind: &'a str, payload: &'a T) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            payload,
        }
    }
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
}

impl JsonlSink {
    /// Create (or truncate) a log at `path`, creating parent directories.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        Ok(Self { file })
    }

    /// Open `path` for appending, creating it if missing.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        Ok(Self { file })
    }

    /// Append one record.
    pub fn write<T: Serialize>(&mut self, event: &T) -> Result<()> {
        let line = serde_json::to_string(event)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}
