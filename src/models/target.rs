//! Target model: one remote team endpoint and its attack status.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RaiderError;

// ============================================================================
// TargetStatus
// ============================================================================

/// Status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Exhausted,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Exhausted)
    }
}

impl FromStr for TargetStatus {
    type Err = RaiderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "exhausted" => Ok(Self::Exhausted),
            _ => Err(RaiderError::InvalidStatus(s.to_string())),
        }
    }
}

impl Default for TargetStatus {
    fn default() -> Self {
        Self::Pending
    }
}

// ============================================================================
// Target
// ============================================================================

/// Per-target overrides of the engagement limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

/// A remote team to attack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Stable identifier used for selection
    pub id: String,
    /// Human-readable name (team or player names)
    pub name: String,
    /// Endpoint reference handed to the transport as-is
    pub endpoint: String,
    #[serde(default)]
    pub overrides: TargetOverrides,
}

impl Target {
    /// Target whose endpoint reference is its id
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            endpoint: id.clone(),
            id,
            name: name.into(),
            overrides: TargetOverrides::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_overrides(mut self, overrides: TargetOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// First eight characters of the id, for log lines.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
