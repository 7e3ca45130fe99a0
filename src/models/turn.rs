//! Turn model for exchanges with a target.
//!
//! A turn is one sent message and the reply it produced. Turns live in a
//! [`TurnLog`], which only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::strategy::StrategyKind;

/// One completed exchange (message/response pair).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Turn number within the session (1-indexed)
    pub turn_number: u32,
    /// Strategy that produced the message
    pub strategy: StrategyKind,
    /// Message sent to the target
    pub message: String,
    /// Target's reply
    pub response: String,
    /// When the reply was received
    pub timestamp: DateTime<Utc>,
}

/// Truncate at a char boundary, appending "..." when shortened.
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Append-only conversation history.
///
/// Derefs to `[Turn]` for reading; the only mutation is [`TurnLog::append`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TurnLog(Vec<Turn>);

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed exchange and return the stored turn.
    pub fn append(
        &mut self,
        strategy: StrategyKind,
        message: String,
        response: String,
    ) -> &Turn {
        let turn = Turn {
            turn_number: self.0.len() as u32 + 1,
            strategy,
            message,
            response,
            timestamp: Utc::now(),
        };
        self.0.push(turn);
        &self.0[self.0.len() - 1]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.0.last()
    }

    pub fn into_vec(self) -> Vec<Turn> {
        self.0
    }
}

impl Deref for TurnLog {
    type Target = [Turn];

    fn deref(&self) -> &[Turn] {
        &self.0
    }
}
