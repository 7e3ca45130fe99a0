use std::path::PathBuf;

use crate::config::default_transcripts_path;
use crate::error::Result;
use crate::export::load_transcripts;
use crate::logging;
use crate::models::{
    ClearLogsData, ExportData, LogEntry, LogsData, StrategiesData, StrategyInfo, SuccessResponse,
};
use crate::strategy::StrategyKind;

/// Strategy catalog, or a single entry of it
pub fn list_strategies(name: Option<StrategyKind>) -> Result<serde_json::Value> {
    let strategies: Vec<StrategyInfo> = StrategyKind::ALL
        .iter()
        .filter(|kind| name.map_or(true, |n| n == **kind))
        .map(|kind| StrategyInfo {
            name: *kind,
            description: kind.description(),
            messages: kind.templates().len(),
        })
        .collect();

    let response = SuccessResponse::new(StrategiesData {
        count: strategies.len(),
        strategies,
    });
    Ok(serde_json::to_value(response)?)
}

/// Saved transcripts from `path` or the default location
pub fn show_export(path: Option<&str>) -> Result<serde_json::Value> {
    let path = path.map(PathBuf::from).unwrap_or_else(default_transcripts_path);
    let transcripts = load_transcripts(&path)?;

    let response = SuccessResponse::new(ExportData {
        path: path.to_string_lossy().to_string(),
        count: transcripts.len(),
        transcripts,
    });
    Ok(serde_json::to_value(response)?)
}

/// Recent op log entries, most recent first
pub fn show_logs(n: usize, operation: Option<&str>) -> Result<serde_json::Value> {
    let entries = logging::read_logs(n, operation)?;
    let count = entries.len();
    let data = LogsData {
        entries: entries
            .into_iter()
            .map(|e| LogEntry {
                timestamp: e.timestamp.to_rfc3339(),
                level: if e.success { "info" } else { "error" }.to_string(),
                operation: e.operation,
                details: e
                    .details
                    .map(|d| serde_json::json!({ "message": d }))
                    .unwrap_or_else(|| serde_json::json!({})),
            })
            .collect(),
        count,
        total: count,
    };
    Ok(serde_json::to_value(SuccessResponse::new(data))?)
}

pub fn clear_logs() -> Result<serde_json::Value> {
    let removed = logging::clear_logs()?;
    tracing::info!("Cleared {} log lines", removed);
    Ok(serde_json::to_value(SuccessResponse::new(ClearLogsData {
        cleared: true,
    }))?)
}
