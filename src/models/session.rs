//! Session records: the archived outcome of one conversation with a target.
//!
//! A [`Transcript`] is produced when a session reaches a terminal status and
//! is the unit of aggregation and export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::target::TargetStatus;
use super::turn::Turn;

// ============================================================================
// ExtractionResult
// ============================================================================

/// A flag found in a response, with the turn it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub flag: String,
    pub turn_number: u32,
}

// ============================================================================
// Transcript
// ============================================================================

/// Exported record of a terminal session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    /// Unique id of the session run that produced this record
    pub session_id: Uuid,
    pub target_id: String,
    pub target_name: String,
    pub status: TargetStatus,
    /// Flag captured by the extractor, if any
    pub extraction: Option<ExtractionResult>,
    /// Attempts that ended in a transport failure (never stored as turns)
    pub failed_attempts: u32,
    /// Last transport or cancellation error, if any
    pub last_error: Option<String>,
    pub turns: Vec<Turn>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Transcript {
    pub fn flag(&self) -> Option<&str> {
        self.extraction.as_ref().map(|e| e.flag.as_str())
    }
}

// ============================================================================
// SweepReport
// ============================================================================

/// One row of a sweep report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub target_id: String,
    pub target_name: String,
    pub status: TargetStatus,
    pub flag: Option<String>,
    pub turns: usize,
    pub failed_attempts: u32,
}

impl From<&Transcript> for SweepEntry {
    fn from(t: &Transcript) -> Self {
        Self {
            target_id: t.target_id.clone(),
            target_name: t.target_name.clone(),
            status: t.status,
            flag: t.flag().map(str::to_string),
            turns: t.turns.len(),
            failed_attempts: t.failed_attempts,
        }
    }
}

/// Aggregated outcome of a sweep, in target order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub entries: Vec<SweepEntry>,
    pub captured: usize,
    pub total: usize,
}

impl SweepReport {
    pub fn from_transcripts<'a>(transcripts: impl IntoIterator<Item = &'a Transcript>) -> Self {
        let entries: Vec<SweepEntry> = transcripts.into_iter().map(SweepEntry::from).collect();
        let captured = entries
            .iter()
            .filter(|e| e.status == TargetStatus::Succeeded)
            .count();
        let total = entries.len();
        Self {
            entries,
            captured,
            total,
        }
    }

    pub fn entry(&self, target_id: &str) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| e.target_id == target_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
