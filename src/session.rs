//! Conversation session: drives one target to a terminal status.
//!
//! Each loop iteration picks a message, waits on the shared rate limiter,
//! sends it and inspects the reply. Failed sends are counted against the
//! retry budget and never stored as turns. Every suspension point is raced
//! against cancellation and the optional session deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extractor::FlagExtractor;
use crate::limiter::RateLimiter;
use crate::models::{ExtractionResult, Target, TargetStatus, Transcript, TurnLog};
use crate::retry::{AttemptState, RetryPolicy};
use crate::strategy::StrategySelector;
use crate::transport::Transport;

/// Collaborators shared by every session of one engagement.
#[derive(Clone)]
pub struct SessionContext {
    pub selector: Arc<StrategySelector>,
    pub extractor: Arc<FlagExtractor>,
    pub limiter: Arc<RateLimiter>,
    pub transport: Arc<dyn Transport>,
    pub cancel: CancellationToken,
    pub session_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupted {
    Cancelled,
    TimedOut,
}

impl Interrupted {
    fn reason(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::TimedOut => "session timed out",
        }
    }
}

pub struct ConversationSession {
    id: Uuid,
    target: Target,
    policy: RetryPolicy,
    ctx: SessionContext,
    history: TurnLog,
    status: TargetStatus,
    attempt: AttemptState,
    failures: u32,
    last_error: Option<String>,
    extraction: Option<ExtractionResult>,
    started_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(target: Target, policy: RetryPolicy, ctx: SessionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            policy,
            ctx,
            history: TurnLog::new(),
            status: TargetStatus::Pending,
            attempt: AttemptState::Ready,
            failures: 0,
            last_error: None,
            extraction: None,
            started_at: Utc::now(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn status(&self) -> TargetStatus {
        self.status
    }

    pub fn history(&self) -> &TurnLog {
        &self.history
    }

    /// Run to a terminal status and hand back the transcript.
    pub async fn run(mut self) -> Transcript {
        self.status = TargetStatus::InProgress;
        self.started_at = Utc::now();
        let deadline = self.ctx.session_timeout.map(|t| Instant::now() + t);

        info!(
            team = self.target.short_id(),
            name = %self.target.name,
            max_turns = self.policy.max_turns(),
            max_retries = self.policy.max_retries(),
            "Starting session"
        );

        while !self.status.is_terminal() {
            self.step(deadline).await;
        }

        match self.status {
            TargetStatus::Succeeded => info!(
                team = self.target.short_id(),
                turns = self.history.len(),
                flag = self.extraction.as_ref().map(|e| e.flag.as_str()).unwrap_or_default(),
                "Flag captured"
            ),
            status => info!(
                team = self.target.short_id(),
                status = status.as_str(),
                turns = self.history.len(),
                failed_attempts = self.failures,
                "Session ended without flag"
            ),
        }

        self.into_transcript()
    }

    async fn step(&mut self, deadline: Option<Instant>) {
        if self.ctx.cancel.is_cancelled() {
            return self.interrupt(Interrupted::Cancelled);
        }
        if !self.policy.allows_turn(self.history.len()) {
            return self.finish(TargetStatus::Exhausted);
        }
        let Some(outgoing) = self.ctx.selector.next_message(&self.history) else {
            debug!(team = self.target.short_id(), "All strategies used");
            return self.finish(TargetStatus::Exhausted);
        };

        self.attempt = AttemptState::Ready;
        let requested = Instant::now();
        let acquired = guarded(self.ctx.limiter.acquire(), &self.ctx.cancel, deadline).await;
        let token = match acquired {
            Ok(token) => token,
            Err(interrupted) => return self.interrupt(interrupted),
        };

        self.attempt = AttemptState::Sent;
        debug!(
            team = self.target.short_id(),
            strategy = outgoing.strategy.as_str(),
            waited_ms = token.granted_at.saturating_duration_since(requested).as_millis() as u64,
            "Sending: {}",
            crate::models::preview(&outgoing.message, 50)
        );
        let sent = guarded(
            self.ctx.transport.send(&self.target.endpoint, &outgoing.message),
            &self.ctx.cancel,
            deadline,
        )
        .await;
        let result = match sent {
            Ok(result) => result,
            Err(interrupted) => return self.interrupt(interrupted),
        };

        match result {
            Ok(response) => {
                self.attempt = AttemptState::Succeeded;
                let found = self.ctx.extractor.extract(&response);
                let turn = self
                    .history
                    .append(outgoing.strategy, outgoing.message, response);
                debug!(
                    team = self.target.short_id(),
                    turn = turn.turn_number,
                    "Response: {}",
                    crate::models::preview(&turn.response, 200)
                );
                if let Some(found) = found {
                    self.extraction = Some(ExtractionResult {
                        flag: found.value,
                        turn_number: turn.turn_number,
                    });
                    self.finish(TargetStatus::Succeeded);
                }
            }
            Err(error) => {
                self.failures += 1;
                self.attempt = self.policy.on_failure(&error, self.failures);
                match self.attempt {
                    AttemptState::RetryableFailure { delay } => {
                        warn!(
                            team = self.target.short_id(),
                            attempt = self.failures,
                            max_retries = self.policy.max_retries(),
                            delay_ms = delay.as_millis() as u64,
                            "Retrying after error: {}",
                            error
                        );
                        self.last_error = Some(error.to_string());
                        let slept = guarded(sleep(delay), &self.ctx.cancel, deadline).await;
                        if let Err(interrupted) = slept {
                            self.interrupt(interrupted);
                        }
                    }
                    AttemptState::FatalFailure(cause) => {
                        warn!(
                            team = self.target.short_id(),
                            attempt = self.failures,
                            "Giving up after error: {}",
                            error
                        );
                        self.last_error = Some(error.to_string());
                        self.finish(cause.status());
                    }
                    AttemptState::Ready | AttemptState::Sent | AttemptState::Succeeded => {}
                }
            }
        }
    }

    fn interrupt(&mut self, interrupted: Interrupted) {
        warn!(
            team = self.target.short_id(),
            reason = interrupted.reason(),
            "Session interrupted"
        );
        self.last_error = Some(interrupted.reason().to_string());
        self.finish(TargetStatus::Failed);
    }

    /// Terminal statuses are sticky.
    fn finish(&mut self, status: TargetStatus) {
        if !self.status.is_terminal() {
            self.status = status;
        }
    }

    fn into_transcript(self) -> Transcript {
        Transcript {
            session_id: self.id,
            target_id: self.target.id,
            target_name: self.target.name,
            status: self.status,
            extraction: self.extraction,
            failed_attempts: self.failures,
            last_error: self.last_error,
            turns: self.history.into_vec(),
            started_at: self.started_at,
            ended_at: Utc::now(),
        }
    }
}

/// Await `fut` unless cancellation or the deadline comes first.
async fn guarded<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<F::Output, Interrupted> {
    let expiry = async {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        _ = expiry => Err(Interrupted::TimedOut),
        out = fut => Ok(out),
    }
}
