//! Attack orchestration across all targets.
//!
//! The orchestrator builds one [`ConversationSession`] per run, awaits it and
//! archives the resulting transcript. It never touches a session while it is
//! running; the rate limiter is the only state sessions share.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngagementSettings;
use crate::error::{RaiderError, Result};
use crate::limiter::RateLimiter;
use crate::models::{SweepReport, Target, TargetStatus, Transcript};
use crate::retry::RetryPolicy;
use crate::session::{ConversationSession, SessionContext};
use crate::transport::Transport;

/// How a sweep schedules its sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepMode {
    /// One target after another, in target order.
    Sequential,
    /// All sessions in flight together; the limiter spaces their requests.
    #[default]
    Concurrent,
}

struct Entry {
    target: Target,
    policy: RetryPolicy,
}

pub struct AttackOrchestrator {
    entries: Vec<Entry>,
    ctx: SessionContext,
    archive: Mutex<HashMap<String, Transcript>>,
    running: Mutex<HashSet<String>>,
}

impl AttackOrchestrator {
    /// Validate the engagement up front; nothing is silently defaulted.
    pub fn new(
        targets: Vec<Target>,
        settings: EngagementSettings,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(RaiderError::NoTargets);
        }
        settings.validate()?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(targets.len());
        for target in targets {
            if !seen.insert(target.id.clone()) {
                return Err(RaiderError::Config(format!(
                    "duplicate target id: {}",
                    target.id
                )));
            }
            let policy = settings.policy_for(&target)?;
            entries.push(Entry { target, policy });
        }

        let ctx = SessionContext {
            selector: Arc::new(settings.selector()),
            extractor: Arc::new(settings.extractor()?),
            limiter,
            transport,
            cancel: CancellationToken::new(),
            session_timeout: settings.session_timeout,
        };

        Ok(Self {
            entries,
            ctx,
            archive: Mutex::new(HashMap::new()),
            running: Mutex::new(HashSet::new()),
        })
    }

    /// Seed the archive with transcripts from an earlier engagement.
    ///
    /// Captured targets are then skipped by `run_one` and `run_sweep`.
    /// Transcripts for unknown targets are ignored.
    pub fn with_archive(self, transcripts: Vec<Transcript>) -> Self {
        {
            let mut archive = lock(&self.archive);
            for transcript in transcripts {
                if self.entries.iter().any(|e| e.target.id == transcript.target_id) {
                    archive.insert(transcript.target_id.clone(), transcript);
                }
            }
        }
        self
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.entries.iter().map(|e| &e.target)
    }

    /// Drive one target to a terminal status.
    ///
    /// A target whose flag is already captured returns its archived
    /// transcript without sending anything. A target with a session
    /// already in flight is `TargetBusy`.
    pub async fn run_one(&self, target_id: &str) -> Result<Transcript> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.target.id == target_id)
            .ok_or_else(|| RaiderError::UnknownTarget(target_id.to_string()))?;

        if let Some(captured) = self.captured(target_id) {
            info!(team = entry.target.short_id(), "Flag already captured, skipping");
            return Ok(captured);
        }
        self.run_entry(entry)
            .await
            .ok_or_else(|| RaiderError::TargetBusy(target_id.to_string()))
    }

    /// Drive every target to a terminal status and aggregate the outcome.
    ///
    /// Targets already captured, or running in another call, are left alone.
    pub async fn run_sweep(&self, mode: SweepMode) -> SweepReport {
        let pending: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| self.captured(&e.target.id).is_none())
            .collect();

        info!(
            targets = self.entries.len(),
            pending = pending.len(),
            mode = ?mode,
            "Starting sweep"
        );

        match mode {
            SweepMode::Sequential => {
                for entry in pending {
                    let _ = self.run_entry(entry).await;
                }
            }
            SweepMode::Concurrent => {
                join_all(pending.into_iter().map(|e| self.run_entry(e))).await;
            }
        }

        let transcripts = self.export();
        let report = SweepReport::from_transcripts(&transcripts);
        info!(
            captured = report.captured,
            total = report.total,
            "Sweep finished"
        );
        report
    }

    /// Archived transcripts, in target order.
    pub fn export(&self) -> Vec<Transcript> {
        let archive = lock(&self.archive);
        self.entries
            .iter()
            .filter_map(|e| archive.get(&e.target.id).cloned())
            .collect()
    }

    /// Current status of a target, or `None` if the id is unknown.
    pub fn status(&self, target_id: &str) -> Option<TargetStatus> {
        if !self.entries.iter().any(|e| e.target.id == target_id) {
            return None;
        }
        if lock(&self.running).contains(target_id) {
            return Some(TargetStatus::InProgress);
        }
        Some(
            lock(&self.archive)
                .get(target_id)
                .map(|t| t.status)
                .unwrap_or(TargetStatus::Pending),
        )
    }

    /// Stop every running session; they end as FAILED.
    ///
    /// Cancellation is permanent for this orchestrator: later runs fail
    /// immediately without sending.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.ctx.cancel.cancel();
    }

    /// Token that cancels this orchestrator when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.cancel.is_cancelled()
    }

    fn captured(&self, target_id: &str) -> Option<Transcript> {
        lock(&self.archive)
            .get(target_id)
            .filter(|t| t.status == TargetStatus::Succeeded)
            .cloned()
    }

    /// Run one session for `entry`; `None` if one is already in flight.
    async fn run_entry(&self, entry: &Entry) -> Option<Transcript> {
        let _claim = RunningClaim::acquire(&self.running, &entry.target.id)?;
        // Another run may have captured the flag since the caller checked.
        if let Some(captured) = self.captured(&entry.target.id) {
            return Some(captured);
        }

        let session = ConversationSession::new(
            entry.target.clone(),
            entry.policy.clone(),
            self.ctx.clone(),
        );
        let transcript = session.run().await;

        lock(&self.archive).insert(entry.target.id.clone(), transcript.clone());
        Some(transcript)
    }
}

/// Marks a target as running until dropped, including when the run future
/// is dropped midway.
struct RunningClaim<'a> {
    running: &'a Mutex<HashSet<String>>,
    target_id: String,
}

impl<'a> RunningClaim<'a> {
    fn acquire(running: &'a Mutex<HashSet<String>>, target_id: &str) -> Option<Self> {
        if !lock(running).insert(target_id.to_string()) {
            return None;
        }
        Some(Self {
            running,
            target_id: target_id.to_string(),
        })
    }
}

impl Drop for RunningClaim<'_> {
    fn drop(&mut self) {
        lock(self.running).remove(&self.target_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
