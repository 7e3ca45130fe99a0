//! Retry and turn budget for one conversation.
//!
//! Transport failures are classified by the transport. The policy only
//! counts them against the budget and picks a backoff delay:
//! `initial_delay * backoff_factor^attempt`, capped at `max_delay`, with a
//! deterministic jitter so runs are reproducible.

use std::future::Future;
use std::time::Duration;

use crate::error::{RaiderError, Result, TransportError};
use crate::limiter::RateLimiter;
use crate::models::TargetStatus;

const MAX_RETRIES: u32 = 3;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;
const MAX_TURNS: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Failed attempts allowed per session; the last one ends the session.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl RetryConfig {
    /// Zero-delay backoff, for tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: Duration::ZERO,
            jitter_fraction: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(RaiderError::Config(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(RaiderError::Config(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(RaiderError::Config(
                "retry.max_delay must not be shorter than retry.initial_delay".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(RaiderError::Config(format!(
                "retry.jitter_fraction must be in [0, 1), got {}",
                self.jitter_fraction
            )));
        }
        Ok(())
    }
}

/// Why an attempt ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCause {
    /// Retry budget used up on retryable failures.
    RetriesExhausted,
    /// Transport reported a permanent failure.
    NonRetryable,
}

impl FatalCause {
    pub fn status(&self) -> TargetStatus {
        match self {
            Self::RetriesExhausted => TargetStatus::Exhausted,
            Self::NonRetryable => TargetStatus::Failed,
        }
    }
}

/// Lifecycle of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Ready,
    Sent,
    Succeeded,
    RetryableFailure { delay: Duration },
    FatalFailure(FatalCause),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    config: RetryConfig,
    max_turns: u32,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, max_turns: u32) -> Self {
        Self { config, max_turns }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Next state after a failed send. `failures` includes this failure.
    pub fn on_failure(&self, error: &TransportError, failures: u32) -> AttemptState {
        if !error.is_retryable() {
            return AttemptState::FatalFailure(FatalCause::NonRetryable);
        }
        if failures >= self.config.max_retries {
            return AttemptState::FatalFailure(FatalCause::RetriesExhausted);
        }
        AttemptState::RetryableFailure {
            delay: self.delay_for_attempt(failures - 1),
        }
    }

    /// Whether another turn may be started after `completed` turns.
    pub fn allows_turn(&self, completed: usize) -> bool {
        (completed as u64) < self.max_turns as u64
    }

    /// Backoff before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max_ms = self.config.max_delay.as_millis() as f64;
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let capped_ms = base_ms.min(max_ms);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        let final_ms = (capped_ms * jitter).min(max_ms).max(0.0);

        Duration::from_millis(final_ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default(), MAX_TURNS)
    }
}

/// Run one API call through the shared limiter, retrying retryable
/// transport failures within the policy's retry budget.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = 0;
    loop {
        limiter.acquire().await;
        match call().await {
            Err(RaiderError::Transport(error)) => {
                failures += 1;
                match policy.on_failure(&error, failures) {
                    AttemptState::RetryableFailure { delay } => {
                        tracing::warn!(
                            attempt = failures,
                            max_retries = policy.max_retries(),
                            delay_ms = delay.as_millis() as u64,
                            "Retrying after error: {}",
                            error
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => return Err(RaiderError::Transport(error)),
                }
            }
            other => return other,
        }
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], fixed per attempt number.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = attempt.wrapping_mul(2654435761) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    fn retryable() -> TransportError {
        TransportError::Retryable("connection reset".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_recovers_after_retryable_failures() {
        let policy = RetryPolicy::new(RetryConfig::default(), 1);
        let limiter = RateLimiter::unlimited();
        let calls = AtomicU32::new(0);

        let result = call_with_retry(&policy, &limiter, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(RaiderError::Transport(retryable()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_stops_at_budget() {
        let policy = RetryPolicy::new(RetryConfig::default(), 1);
        let limiter = RateLimiter::unlimited();
        let calls = AtomicU32::new(0);

        let result: Result<()> = call_with_retry(&policy, &limiter, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RaiderError::Transport(retryable())) }
        })
        .await;

        assert!(matches!(result, Err(RaiderError::Transport(TransportError::Retryable(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_does_not_retry_fatal_or_other_errors() {
        let policy = RetryPolicy::default();
        let limiter = RateLimiter::unlimited();
        let calls = AtomicU32::new(0);

        let fatal: Result<()> = call_with_retry(&policy, &limiter, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RaiderError::Transport(TransportError::Fatal("HTTP 404".into()))) }
        })
        .await;
        assert!(fatal.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let config: Result<()> = call_with_retry(&policy, &limiter, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RaiderError::NoTargets) }
        })
        .await;
        assert!(matches!(config, Err(RaiderError::NoTargets)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_paces_through_limiter() {
        let policy = RetryPolicy::new(RetryConfig::immediate(3), 1);
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = tokio::time::Instant::now();

        let _: Result<()> = call_with_retry(&policy, &limiter, || async {
            Err(RaiderError::Transport(retryable()))
        })
        .await;

        // Three grants, spaced by the limiter even with zero backoff.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_fatal_error_never_retried() {
        let policy = RetryPolicy::default();
        let err = TransportError::Fatal("HTTP 401".into());
        assert_eq!(
            policy.on_failure(&err, 1),
            AttemptState::FatalFailure(FatalCause::NonRetryable)
        );
    }

    #[test]
    fn test_retryable_until_budget() {
        let policy = RetryPolicy::new(RetryConfig::immediate(3), 10);
        assert!(matches!(
            policy.on_failure(&retryable(), 1),
            AttemptState::RetryableFailure { .. }
        ));
        assert!(matches!(
            policy.on_failure(&retryable(), 2),
            AttemptState::RetryableFailure { .. }
        ));
        assert_eq!(
            policy.on_failure(&retryable(), 3),
            AttemptState::FatalFailure(FatalCause::RetriesExhausted)
        );
    }

    #[test]
    fn test_single_retry_budget_ends_on_first_failure() {
        let policy = RetryPolicy::new(RetryConfig::immediate(1), 10);
        assert_eq!(
            policy.on_failure(&retryable(), 1),
            AttemptState::FatalFailure(FatalCause::RetriesExhausted)
        );
    }

    #[test]
    fn test_fatal_cause_status() {
        assert_eq!(FatalCause::RetriesExhausted.status(), TargetStatus::Exhausted);
        assert_eq!(FatalCause::NonRetryable.status(), TargetStatus::Failed);
    }

    #[test]
    fn test_allows_turn() {
        let policy = RetryPolicy::new(RetryConfig::default(), 2);
        assert!(policy.allows_turn(0));
        assert!(policy.allows_turn(1));
        assert!(!policy.allows_turn(2));
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let policy = RetryPolicy::default();
        let d0 = policy.delay_for_attempt(0);
        let d1 = policy.delay_for_attempt(1);
        let d2 = policy.delay_for_attempt(2);

        // ~1000ms, ~2000ms, ~4000ms within 20% jitter
        assert!(d0.as_millis() >= 800 && d0.as_millis() <= 1200);
        assert!(d1.as_millis() >= 1600 && d1.as_millis() <= 2400);
        assert!(d2.as_millis() >= 3200 && d2.as_millis() <= 4800);
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let policy = RetryPolicy::default();
        for attempt in 0..64 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(MAX_DELAY_MS));
        }
    }

    #[test]
    fn test_immediate_config_has_zero_delay() {
        let policy = RetryPolicy::new(RetryConfig::immediate(5), 1);
        assert_eq!(policy.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {} out of range", j);
        }
        assert_eq!(deterministic_jitter(5, 0.2), deterministic_jitter(5, 0.2));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        assert!(RetryConfig::default().validate().is_ok());
        assert!(RetryConfig::immediate(0).validate().is_err());

        let mut cfg = RetryConfig::default();
        cfg.backoff_factor = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = RetryConfig::default();
        cfg.max_delay = Duration::from_millis(10);
        assert!(cfg.validate().is_err());

        let mut cfg = RetryConfig::default();
        cfg.jitter_fraction = 1.0;
        assert!(cfg.validate().is_err());
    }
}
