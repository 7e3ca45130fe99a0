//! Logging for raider operations.
//!
//! Two sinks:
//! - `tracing` events on stderr for live progress (stdout carries JSON results),
//! - a file op log at `<data_dir>/logs/raider.log` with 1MB rotation.

use crate::config::data_dir;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "raider.log";
const LOG_DIR_NAME: &str = "logs";
const MAX_LOG_SIZE: u64 = 1_048_576; // 1MB

/// Install the stderr subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (e.g. from tests) is not an error worth surfacing.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// A single log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub details: Option<String>,
    pub success: bool,
}

impl LogEntry {
    pub fn new(operation: impl Into<String>, details: Option<String>, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            details,
            success,
        }
    }

    /// Format as a single log line.
    pub fn to_log_line(&self) -> String {
        let status = if self.success { "OK" } else { "ERR" };
        // Keep one entry per line.
        let details = self
            .details
            .as_deref()
            .map(|d| d.replace(['\n', '\r'], " "))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            status,
            self.operation,
            details
        )
    }

    /// Parse from a log line.
    pub fn from_log_line(line: &str) -> Option<Self> {
        // Format: [2024-01-24 10:30:45] OK sweep captured=2 total=3
        if !line.starts_with('[') {
            return None;
        }

        let timestamp_end = line.find(']')?;
        let timestamp_str = &line[1..timestamp_end];

        let rest = line.get(timestamp_end + 2..)?.trim();
        let parts: Vec<&str> = rest.splitn(3, ' ').collect();
        if parts.len() < 2 {
            return None;
        }

        let success = parts[0] == "OK";
        let operation = parts[1].to_string();
        let details = parts.get(2).map(|s| s.to_string()).filter(|s| s != "-");

        let timestamp = chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc())?;

        Some(Self {
            timestamp,
            operation,
            details,
            success,
        })
    }
}

/// Get the log file path, creating the log directory if needed.
pub fn get_log_path() -> Result<PathBuf> {
    let log_dir = data_dir().join(LOG_DIR_NAME);

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }

    Ok(log_dir.join(LOG_FILE_NAME))
}

fn needs_rotation(path: &Path) -> bool {
    if let Ok(metadata) = fs::metadata(path) {
        metadata.len() >= MAX_LOG_SIZE
    } else {
        false
    }
}

/// Rotate log file (rename to .old, start fresh).
fn rotate_log(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let old_path = path.with_extension("log.old");
    if old_path.exists() {
        fs::remove_file(&old_path)?;
    }
    fs::rename(path, &old_path)?;

    Ok(())
}

/// Write a log entry.
pub fn log(operation: impl Into<String>, details: Option<String>, success: bool) -> Result<()> {
    append_to(&get_log_path()?, LogEntry::new(operation, details, success))
}

/// Write a log entry; a failing op log never fails the command.
pub fn record(operation: &str, details: impl Into<String>, success: bool) {
    if let Err(e) = log(operation, Some(details.into()), success) {
        tracing::warn!("Failed to write op log: {}", e);
    }
}

fn append_to(path: &Path, entry: LogEntry) -> Result<()> {
    if needs_rotation(path) {
        rotate_log(path)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", entry.to_log_line())?;
    writer.flush()?;

    Ok(())
}

/// Read log entries.
///
/// - `limit`: Maximum number of entries to return (most recent first)
/// - `operation`: Optional filter by operation name
pub fn read_logs(limit: usize, operation: Option<&str>) -> Result<Vec<LogEntry>> {
    read_from(&get_log_path()?, limit, operation)
}

fn read_from(path: &Path, limit: usize, operation: Option<&str>) -> Result<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);

    let mut entries: Vec<LogEntry> = reader
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|line| LogEntry::from_log_line(&line))
        .filter(|entry| operation.map_or(true, |op| entry.operation.eq_ignore_ascii_case(op)))
        .collect();

    entries.reverse();
    entries.truncate(limit);

    Ok(entries)
}

/// Clear all logs. Returns the number of lines removed.
pub fn clear_logs() -> Result<usize> {
    clear_at(&get_log_path()?)
}

fn clear_at(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let count = BufReader::new(File::open(path)?).lines().count();
    File::create(path)?;

    let old_path = path.with_extension("log.old");
    if old_path.exists() {
        fs::remove_file(&old_path)?;
    }

    Ok(count)
}
