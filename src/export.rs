//! Transcript persistence as pretty-printed JSON.

use std::fs;
use std::path::Path;

use crate::error::{RaiderError, Result};
use crate::models::{TargetStatus, Transcript};

/// Write transcripts to `path`, creating parent directories as needed.
pub fn save_transcripts(path: &Path, transcripts: &[Transcript]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(transcripts)?;
    fs::write(path, json)?;
    tracing::info!("Saved {} transcripts to {}", transcripts.len(), path.display());
    Ok(())
}

/// Read transcripts written by [`save_transcripts`]. A missing file is empty.
pub fn load_transcripts(path: &Path) -> Result<Vec<Transcript>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        RaiderError::Config(format!(
            "Failed to parse transcripts at {}: {}",
            path.display(),
            e
        ))
    })
}

/// Replace saved transcripts with fresh ones for the same targets.
///
/// Saved targets keep their position; new targets are appended in order.
/// A captured flag is never replaced by a run that did not capture one.
pub fn merge_transcripts(saved: Vec<Transcript>, fresh: Vec<Transcript>) -> Vec<Transcript> {
    let mut merged = saved;
    for transcript in fresh {
        match merged.iter_mut().find(|t| t.target_id == transcript.target_id) {
            Some(slot)
                if slot.status == TargetStatus::Succeeded
                    && transcript.status != TargetStatus::Succeeded =>
            {
                tracing::debug!(
                    team = %transcript.target_id,
                    "Keeping saved capture over {} run",
                    transcript.status.as_str()
                );
            }
            Some(slot) => *slot = transcript,
            None => merged.push(transcript),
        }
    }
    merged
}

/// Merge fresh transcripts into the file at `path`.
///
/// An unreadable file is an error and is left untouched.
pub fn record_transcripts(path: &Path, fresh: &[Transcript]) -> Result<()> {
    let saved = load_transcripts(path)?;
    save_transcripts(path, &merge_transcripts(saved, fresh.to_vec()))
}
