use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RaiderError, Result};
use crate::extractor::{FlagExtractor, DEFAULT_FLAG_PATTERN};
use crate::models::Target;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::strategy::{StrategyKind, StrategySelector};

const DATA_DIR_NAME: &str = ".ctf-raider";
const CONFIG_FILE_NAME: &str = "config.json";
const TRANSCRIPTS_FILE_NAME: &str = "transcripts.json";

/// Root directory for config, logs and transcripts.
///
/// `$CTF_RAIDER_HOME` wins over `~/.ctf-raider`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CTF_RAIDER_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Default location for saved transcripts
pub fn default_transcripts_path() -> PathBuf {
    data_dir().join(TRANSCRIPTS_FILE_NAME)
}

/// Retry settings as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter_fraction: defaults.jitter_fraction,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_fraction: self.jitter_fraction,
        }
    }
}

/// Flag grammar as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlagSettings {
    pub patterns: Vec<String>,
    pub case_insensitive: bool,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            patterns: vec![DEFAULT_FLAG_PATTERN.to_string()],
            case_insensitive: false,
        }
    }
}

/// Client configuration loaded from ~/.ctf-raider/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaiderConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    /// Minimum spacing between any two outbound requests
    pub min_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub session_timeout_secs: Option<u64>,
    pub max_turns: u32,
    pub retry: RetrySettings,
    pub flag: FlagSettings,
    pub strategies: Vec<StrategyKind>,
    /// Static target list; empty means ask the API
    pub targets: Vec<Target>,
}

impl Default for RaiderConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000/api".to_string(),
            api_key: None,
            min_interval_ms: 500,
            request_timeout_secs: 30,
            session_timeout_secs: None,
            max_turns: 20,
            retry: RetrySettings::default(),
            flag: FlagSettings::default(),
            strategies: StrategyKind::ALL.to_vec(),
            targets: Vec::new(),
        }
    }
}

impl RaiderConfig {
    /// Load config from the standard location, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                RaiderError::Config(format!("Failed to read config file: {}", e))
            })?;
            let config: RaiderConfig = serde_json::from_str(&content).map_err(|e| {
                RaiderError::Config(format!("Failed to parse config JSON: {}", e))
            })?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the standard config file path
    pub fn config_path() -> PathBuf {
        data_dir().join(CONFIG_FILE_NAME)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base) = std::env::var("CTF_API_BASE") {
            if !base.is_empty() {
                self.api_base = base;
            }
        }
        if let Ok(key) = std::env::var("CTF_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validated engagement limits for the orchestrator
    pub fn engagement(&self) -> Result<EngagementSettings> {
        let settings = EngagementSettings {
            retry: self.retry.to_retry_config(),
            max_turns: self.max_turns,
            strategies: self.strategies.clone(),
            flag: self.flag.clone(),
            session_timeout: self.session_timeout_secs.map(Duration::from_secs),
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Limits and grammar shared by every session of one engagement
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementSettings {
    pub retry: RetryConfig,
    pub max_turns: u32,
    pub strategies: Vec<StrategyKind>,
    pub flag: FlagSettings,
    pub session_timeout: Option<Duration>,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        let config = RaiderConfig::default();
        Self {
            retry: config.retry.to_retry_config(),
            max_turns: config.max_turns,
            strategies: config.strategies,
            flag: config.flag,
            session_timeout: None,
        }
    }
}

impl EngagementSettings {
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        if self.max_turns == 0 {
            return Err(RaiderError::Config(
                "max_turns must be at least 1".to_string(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(RaiderError::Config(
                "at least one strategy is required".to_string(),
            ));
        }
        if self.session_timeout == Some(Duration::ZERO) {
            return Err(RaiderError::Config(
                "session_timeout_secs must be positive".to_string(),
            ));
        }
        self.extractor()?;
        Ok(())
    }

    pub fn extractor(&self) -> Result<FlagExtractor> {
        FlagExtractor::new(&self.flag.patterns, self.flag.case_insensitive)
    }

    pub fn selector(&self) -> StrategySelector {
        StrategySelector::new(self.strategies.clone())
    }

    /// Policy for one target, with its overrides applied
    pub fn policy_for(&self, target: &Target) -> Result<RetryPolicy> {
        let mut retry = self.retry.clone();
        if let Some(max_retries) = target.overrides.max_retries {
            retry.max_retries = max_retries;
        }
        let max_turns = target.overrides.max_turns.unwrap_or(self.max_turns);

        retry.validate().map_err(|e| {
            RaiderError::Config(format!("target {}: {}", target.id, e))
        })?;
        if max_turns == 0 {
            return Err(RaiderError::Config(format!(
                "target {}: max_turns must be at least 1",
                target.id
            )));
        }
        Ok(RetryPolicy::new(retry, max_turns))
    }
}

// ============================================================================
// Tests
// ============================================================================
