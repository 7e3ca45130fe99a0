use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::CtfClient;
use crate::commands::targets::{api_policy, resolve_targets, submit_guess};
use crate::config::{default_transcripts_path, RaiderConfig};
use crate::error::Result;
use crate::export::{load_transcripts, record_transcripts};
use crate::extractor::FlagExtractor;
use crate::limiter::RateLimiter;
use crate::logging;
use crate::models::{GuessOutcome, RunData, SuccessResponse, SweepData, Target, Transcript};
use crate::orchestrator::{AttackOrchestrator, SweepMode};
use crate::retry::RetryPolicy;

/// Attack one target
pub async fn run_target(
    config: &RaiderConfig,
    client: Arc<CtfClient>,
    limiter: Arc<RateLimiter>,
    target_id: &str,
    submit: bool,
) -> Result<serde_json::Value> {
    let engagement = Engagement::prepare(config, &client, &limiter).await?;
    let orchestrator = engagement.orchestrator(config, client.clone(), limiter.clone())?;

    let watcher = cancel_on_ctrl_c(orchestrator.cancellation_token());
    let outcome = orchestrator.run_one(target_id).await;
    watcher.abort();
    let transcript = outcome?;

    logging::record(
        "run",
        format!(
            "team={} status={} turns={}",
            transcript.target_id,
            transcript.status.as_str(),
            transcript.turns.len()
        ),
        transcript.flag().is_some(),
    );

    let fresh = engagement.fresh(vec![transcript.clone()]);
    record_transcripts(&engagement.path, &fresh)?;

    let submissions = if submit {
        engagement.submit_captures(&client, &limiter, &fresh).await
    } else {
        Vec::new()
    };

    let response = SuccessResponse::new(RunData {
        transcript,
        submissions,
    });
    Ok(serde_json::to_value(response)?)
}

/// Attack every target
pub async fn sweep(
    config: &RaiderConfig,
    client: Arc<CtfClient>,
    limiter: Arc<RateLimiter>,
    mode: SweepMode,
    submit: bool,
) -> Result<serde_json::Value> {
    let engagement = Engagement::prepare(config, &client, &limiter).await?;
    let orchestrator = engagement.orchestrator(config, client.clone(), limiter.clone())?;

    let watcher = cancel_on_ctrl_c(orchestrator.cancellation_token());
    let report = orchestrator.run_sweep(mode).await;
    watcher.abort();

    logging::record(
        "sweep",
        format!("captured={} total={}", report.captured, report.total),
        !orchestrator.is_cancelled(),
    );

    let fresh = engagement.fresh(orchestrator.export());
    record_transcripts(&engagement.path, &fresh)?;

    let submissions = if submit {
        engagement.submit_captures(&client, &limiter, &fresh).await
    } else {
        Vec::new()
    };

    let response = SuccessResponse::new(SweepData {
        report,
        submissions,
    });
    Ok(serde_json::to_value(response)?)
}

/// Everything an attack command needs before the first message is sent.
///
/// Saved transcripts are read up front, so an unreadable file aborts the
/// command before any target is attacked.
struct Engagement {
    path: PathBuf,
    saved: Vec<Transcript>,
    policy: RetryPolicy,
    extractor: FlagExtractor,
    targets: Vec<Target>,
}

impl Engagement {
    async fn prepare(
        config: &RaiderConfig,
        client: &CtfClient,
        limiter: &RateLimiter,
    ) -> Result<Self> {
        let path = default_transcripts_path();
        let saved = load_transcripts(&path)?;
        let policy = api_policy(config)?;
        let extractor = config.engagement()?.extractor()?;
        let targets = resolve_targets(config, client, limiter, &policy).await?;
        Ok(Self {
            path,
            saved,
            policy,
            extractor,
            targets,
        })
    }

    /// Orchestrator seeded with saved captures
    fn orchestrator(
        &self,
        config: &RaiderConfig,
        client: Arc<CtfClient>,
        limiter: Arc<RateLimiter>,
    ) -> Result<AttackOrchestrator> {
        Ok(
            AttackOrchestrator::new(self.targets.clone(), config.engagement()?, client, limiter)?
                .with_archive(self.saved.clone()),
        )
    }

    /// Drop transcripts that came from the saved file rather than this run
    fn fresh(&self, transcripts: Vec<Transcript>) -> Vec<Transcript> {
        let seeded: HashSet<Uuid> = self.saved.iter().map(|t| t.session_id).collect();
        transcripts
            .into_iter()
            .filter(|t| !seeded.contains(&t.session_id))
            .collect()
    }

    /// Submit the flags of every capture; failed submissions are logged and skipped.
    async fn submit_captures(
        &self,
        client: &CtfClient,
        limiter: &RateLimiter,
        transcripts: &[Transcript],
    ) -> Vec<GuessOutcome> {
        let policy = &self.policy;
        let mut outcomes = Vec::new();
        for transcript in transcripts {
            let candidates = flag_candidates(transcript, &self.extractor);
            if candidates.is_empty() {
                continue;
            }
            let target_id = transcript.target_id.as_str();
            let submitted = submit_until_accepted(target_id, candidates, move |guess| async move {
                submit_guess(client, limiter, policy, target_id, &guess).await
            })
            .await;
            outcomes.extend(submitted);
        }
        outcomes
    }
}

/// Every distinct flag in the capturing reply, the extracted one first
fn flag_candidates(transcript: &Transcript, extractor: &FlagExtractor) -> Vec<String> {
    let Some(extraction) = &transcript.extraction else {
        return Vec::new();
    };
    let mut candidates = vec![extraction.flag.clone()];
    if let Some(turn) = transcript
        .turns
        .iter()
        .find(|t| t.turn_number == extraction.turn_number)
    {
        candidates.extend(extractor.extract_all(&turn.response));
    }
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    candidates
}

/// Submit candidates in order until one is accepted
async fn submit_until_accepted<F, Fut>(
    target_id: &str,
    candidates: Vec<String>,
    mut submit: F,
) -> Vec<GuessOutcome>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<GuessOutcome>>,
{
    let mut outcomes = Vec::new();
    for candidate in candidates {
        match submit(candidate).await {
            Ok(outcome) => {
                let accepted = outcome.correct;
                outcomes.push(outcome);
                if accepted {
                    break;
                }
            }
            Err(e) => tracing::warn!(team = target_id, "Guess submission failed: {}", e),
        }
    }
    outcomes
}

/// Cancel the engagement on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    tracing::warn!("Interrupted, cancelling running sessions");
                    token.cancel();
                }
            }
            _ = token.cancelled() => {}
        }
    })
}
