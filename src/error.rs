use thiserror::Error;

/// Failure reported by a transport, already classified by the transport itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transient: timeout, connection reset, rate limiting, 5xx.
    #[error("Retryable transport error: {0}")]
    Retryable(String),

    /// Permanent: authentication rejected, unknown target, bad request.
    #[error("Fatal transport error: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

#[derive(Error, Debug)]
pub enum RaiderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No targets configured")]
    NoTargets,

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Target already running: {0}")]
    TargetBusy(String),

    #[error("Invalid strategy: {0}. Must be one of: direct_request, authority_impersonation, teammate_impersonation, technical_support, urgency, incremental_trust, role_play_pretext, reverse_psychology")]
    InvalidStrategy(String),

    #[error("Invalid status: {0}. Must be one of: pending, in_progress, succeeded, failed, exhausted")]
    InvalidStatus(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid flag pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RaiderError>;
