use serde::Serialize;

use super::session::{SweepReport, Transcript};
use super::target::Target;
use crate::strategy::StrategyKind;

// ============================================================================
// Base Response Types
// ============================================================================

/// Wrapper for successful responses with data
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// ============================================================================
// Target Responses
// ============================================================================

/// Response for listing targets
#[derive(Debug, Serialize)]
pub struct TargetsData {
    pub targets: Vec<Target>,
    pub count: usize,
}

/// Result of submitting one flag guess
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessOutcome {
    pub target_id: String,
    pub guess: String,
    pub correct: bool,
}

/// Response for a guess submission
#[derive(Debug, Serialize)]
pub struct GuessData {
    #[serde(flatten)]
    pub outcome: GuessOutcome,
}

// ============================================================================
// Attack Responses
// ============================================================================

/// Response for a single-target run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub transcript: Transcript,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub submissions: Vec<GuessOutcome>,
}

/// Response for a sweep
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepData {
    pub report: SweepReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub submissions: Vec<GuessOutcome>,
}

/// Response for transcript export
#[derive(Debug, Serialize)]
pub struct ExportData {
    pub path: String,
    pub transcripts: Vec<Transcript>,
    pub count: usize,
}

/// One strategy in the catalog listing
#[derive(Debug, Serialize)]
pub struct StrategyInfo {
    pub name: StrategyKind,
    pub description: &'static str,
    pub messages: usize,
}

/// Response for listing strategies
#[derive(Debug, Serialize)]
pub struct StrategiesData {
    pub strategies: Vec<StrategyInfo>,
    pub count: usize,
}

// ============================================================================
// Log Responses
// ============================================================================

/// Single log entry
#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub operation: String,
    #[serde(flatten)]
    pub details: serde_json::Value,
}

/// Response for reading logs
#[derive(Debug, Serialize)]
pub struct LogsData {
    pub entries: Vec<LogEntry>,
    pub count: usize,
    pub total: usize,
}

/// Response for clearing logs
#[derive(Debug, Serialize)]
pub struct ClearLogsData {
    pub cleared: bool,
}

// ============================================================================
// Tests
// ============================================================================
