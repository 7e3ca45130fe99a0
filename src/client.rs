//! HTTP client for the CTF API.
//!
//! Endpoints:
//! - `GET  {base}/targets` lists teams,
//! - `POST {base}/attack` sends one message to a team and returns its reply,
//! - `POST {base}/guess` checks a flag guess.
//!
//! Retries: timeouts, connection errors, 408, 429, 5xx, undecodable bodies.
//! Does NOT retry: 401, 403, 404 and other 4xx.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RaiderConfig;
use crate::error::{Result, TransportError};
use crate::models::Target;
use crate::transport::Transport;

pub struct CtfClient {
    api_base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttackRequest<'a> {
    target_team_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct AttackResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuessRequest<'a> {
    target_team_id: &'a str,
    guess: &'a str,
}

#[derive(Debug, Deserialize)]
struct GuessResponse {
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Deserialize)]
struct TargetsResponse {
    #[serde(default)]
    targets: Vec<RemoteTarget>,
}

/// Team as listed by the API
#[derive(Debug, Deserialize)]
struct RemoteTarget {
    id: String,
    #[serde(default, rename = "playerNames")]
    player_names: serde_json::Value,
}

impl RemoteTarget {
    fn into_target(self) -> Target {
        let name = match &self.player_names {
            serde_json::Value::String(s) if !s.is_empty() => s.clone(),
            serde_json::Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            _ => self.id.clone(),
        };
        Target::new(self.id, name)
    }
}

impl CtfClient {
    pub fn new(api_base: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("ctf-raider/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn from_config(config: &RaiderConfig) -> Result<Self> {
        Self::new(&config.api_base, config.api_key.clone(), config.request_timeout())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// List available targets
    pub async fn list_targets(&self) -> Result<Vec<Target>> {
        tracing::info!("Fetching available targets...");
        let request = self.authorize(self.client.get(self.url("targets")));
        let data: TargetsResponse = execute(request).await?;
        let targets: Vec<Target> = data
            .targets
            .into_iter()
            .map(RemoteTarget::into_target)
            .collect();
        tracing::info!("Found {} targets", targets.len());
        Ok(targets)
    }

    /// Submit a flag guess; `true` when the server accepts it
    pub async fn submit_guess(&self, target_id: &str, guess: &str) -> Result<bool> {
        let request = self
            .authorize(self.client.post(self.url("guess")))
            .json(&GuessRequest {
                target_team_id: target_id,
                guess,
            });
        let data: GuessResponse = execute(request).await?;
        if data.correct {
            tracing::info!(team = target_id, "Guess accepted");
        } else {
            tracing::info!(team = target_id, "Wrong guess");
        }
        Ok(data.correct)
    }
}

#[async_trait]
impl Transport for CtfClient {
    async fn send(&self, endpoint: &str, message: &str) -> std::result::Result<String, TransportError> {
        let request = self
            .authorize(self.client.post(self.url("attack")))
            .json(&AttackRequest {
                target_team_id: endpoint,
                message,
            });
        let data: AttackResponse = execute(request).await?;
        Ok(data.response)
    }
}

async fn execute<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, TransportError> {
    let response = request.send().await.map_err(|e| classify_send_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!("HTTP {}: {}", status, crate::models::preview(&body, 200));
        return Err(classify_status(status, &body));
    }

    let body = response.text().await.map_err(|e| classify_send_error(&e))?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::error!("Failed to decode JSON: {}", crate::models::preview(&body, 200));
        TransportError::Retryable(format!("invalid JSON response: {}", e))
    })
}

fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let message = format!("HTTP {}: {}", status.as_u16(), crate::models::preview(body, 200));
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        TransportError::Retryable(message)
    } else {
        TransportError::Fatal(message)
    }
}

fn classify_send_error(error: &reqwest::Error) -> TransportError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        TransportError::Retryable(error.to_string())
    } else {
        TransportError::Fatal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        for code in [500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(classify_status(status, "oops").is_retryable(), "{}", code);
        }
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_retryable());
    }

    #[test]
    fn test_client_errors_are_fatal() {
        for code in [400, 401, 403, 404, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!classify_status(status, "no").is_retryable(), "{}", code);
        }
    }

    #[test]
    fn test_status_message_includes_code_and_body() {
        let err = classify_status(StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err, TransportError::Fatal("HTTP 401: bad key".to_string()));
    }

    #[test]
    fn test_url_joining_trims_slashes() {
        let client = CtfClient::new("https://ctf.example.com/api/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.api_base(), "https://ctf.example.com/api");
        assert_eq!(client.url("/attack"), "https://ctf.example.com/api/attack");
        assert_eq!(client.url("targets"), "https://ctf.example.com/api/targets");
    }

    #[test]
    fn test_attack_request_body_shape() {
        let body = serde_json::to_value(AttackRequest {
            target_team_id: "team-1",
            message: "hi",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"targetTeamId": "team-1", "message": "hi"}));
    }

    #[test]
    fn test_guess_request_body_shape() {
        let body = serde_json::to_value(GuessRequest {
            target_team_id: "team-1",
            guess: "FLAG{x}",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"targetTeamId": "team-1", "guess": "FLAG{x}"}));
    }

    #[test]
    fn test_targets_response_mapping() {
        let json = r#"{"targets": [
            {"id": "abc", "playerNames": ["alice", "bob"]},
            {"id": "def", "playerNames": "carol"},
            {"id": "ghi"}
        ]}"#;
        let data: TargetsResponse = serde_json::from_str(json).unwrap();
        let targets: Vec<Target> = data.targets.into_iter().map(RemoteTarget::into_target).collect();

        assert_eq!(targets[0].name, "alice, bob");
        assert_eq!(targets[0].endpoint, "abc");
        assert_eq!(targets[1].name, "carol");
        assert_eq!(targets[2].name, "ghi");
    }

    #[test]
    fn test_missing_response_field_defaults_to_empty() {
        let data: AttackResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(data.response, "");
        let guess: GuessResponse = serde_json::from_str("{}").unwrap();
        assert!(!guess.correct);
    }
}
