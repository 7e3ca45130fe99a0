pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod limiter;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod strategy;
pub mod transport;

pub use cli::{Cli, Command};
pub use client::CtfClient;
pub use config::{EngagementSettings, RaiderConfig};
pub use error::{RaiderError, Result, TransportError};
pub use extractor::{FlagExtractor, FlagMatch, DEFAULT_FLAG_PATTERN};
pub use limiter::{RateLimiter, RateToken};
pub use orchestrator::{AttackOrchestrator, SweepMode};
pub use retry::{call_with_retry, AttemptState, FatalCause, RetryConfig, RetryPolicy};
pub use session::{ConversationSession, SessionContext};
pub use strategy::{Outgoing, StrategyKind, StrategySelector};
pub use transport::Transport;
