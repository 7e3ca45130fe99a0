use crate::client::CtfClient;
use crate::config::RaiderConfig;
use crate::error::{RaiderError, Result};
use crate::limiter::RateLimiter;
use crate::logging;
use crate::models::{GuessData, GuessOutcome, SuccessResponse, Target, TargetsData};
use crate::retry::{call_with_retry, RetryPolicy};

/// Retry budget for control-plane calls (listing, guesses)
pub fn api_policy(config: &RaiderConfig) -> Result<RetryPolicy> {
    let settings = config.engagement()?;
    Ok(RetryPolicy::new(settings.retry, settings.max_turns))
}

/// Targets from the config file, or from the API when none are configured
pub async fn resolve_targets(
    config: &RaiderConfig,
    client: &CtfClient,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
) -> Result<Vec<Target>> {
    if !config.targets.is_empty() {
        tracing::info!("Using {} configured targets", config.targets.len());
        return Ok(config.targets.clone());
    }
    let targets = call_with_retry(policy, limiter, || client.list_targets()).await?;
    if targets.is_empty() {
        return Err(RaiderError::NoTargets);
    }
    Ok(targets)
}

/// List attackable targets
pub async fn list_targets(
    config: &RaiderConfig,
    client: &CtfClient,
    limiter: &RateLimiter,
) -> Result<serde_json::Value> {
    let policy = api_policy(config)?;
    let targets = resolve_targets(config, client, limiter, &policy).await?;
    logging::record("targets", format!("count={}", targets.len()), true);

    let response = SuccessResponse::new(TargetsData {
        count: targets.len(),
        targets,
    });
    Ok(serde_json::to_value(response)?)
}

/// Submit one guess, spaced by the shared limiter
pub async fn submit_guess(
    client: &CtfClient,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    target_id: &str,
    guess: &str,
) -> Result<GuessOutcome> {
    match call_with_retry(policy, limiter, || client.submit_guess(target_id, guess)).await {
        Ok(correct) => {
            logging::record(
                "guess",
                format!("team={} correct={}", target_id, correct),
                true,
            );
            Ok(GuessOutcome {
                target_id: target_id.to_string(),
                guess: guess.to_string(),
                correct,
            })
        }
        Err(e) => {
            logging::record("guess", format!("team={} error={}", target_id, e), false);
            Err(e)
        }
    }
}

/// `guess` command
pub async fn guess(
    config: &RaiderConfig,
    client: &CtfClient,
    limiter: &RateLimiter,
    target_id: &str,
    flag: &str,
) -> Result<serde_json::Value> {
    let policy = api_policy(config)?;
    let outcome = submit_guess(client, limiter, &policy, target_id, flag).await?;
    Ok(serde_json::to_value(SuccessResponse::new(GuessData { outcome }))?)
}
