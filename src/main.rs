//! ctf-raider: multi-target prompt-injection attack client
//!
//! Main entry point for the CLI application.
//! Dispatches commands to the appropriate handlers and outputs JSON results.
//! Progress goes to stderr; stdout carries only the JSON result.

use clap::Parser;
use std::sync::Arc;

use ctf_raider::commands;
use ctf_raider::logging::init_tracing;
use ctf_raider::models::ErrorResponse;
use ctf_raider::{Cli, Command, CtfClient, RaiderConfig, RateLimiter, Result, SweepMode};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
        Err(e) => {
            let error_response = ErrorResponse::new(e.to_string());
            println!(
                "{}",
                serde_json::to_string_pretty(&error_response)
                    .unwrap_or_else(|_| format!("{{\"success\":false,\"error\":{:?}}}", e.to_string()))
            );
            std::process::exit(1);
        }
    }
}

/// Run the dispatched command
async fn run(cli: Cli) -> Result<serde_json::Value> {
    match cli.command {
        // Commands that don't touch the network
        Command::Strategies { name } => commands::list_strategies(name),
        Command::Export { path } => commands::show_export(path.as_deref()),
        Command::Logs { n, operation } => commands::show_logs(n, operation.as_deref()),
        Command::ClearLogs => commands::clear_logs(),

        // Commands that talk to the CTF API
        command => {
            let config = RaiderConfig::load()?;
            let client = Arc::new(CtfClient::from_config(&config)?);
            let limiter = Arc::new(RateLimiter::new(config.min_interval()));
            dispatch_api_command(command, &config, client, limiter).await
        }
    }
}

/// Dispatch commands that require the CTF API
async fn dispatch_api_command(
    command: Command,
    config: &RaiderConfig,
    client: Arc<CtfClient>,
    limiter: Arc<RateLimiter>,
) -> Result<serde_json::Value> {
    match command {
        Command::Targets => commands::list_targets(config, &client, &limiter).await,

        Command::Run { target_id, submit } => {
            commands::run_target(config, client, limiter, &target_id, submit).await
        }

        Command::Sweep { sequential, submit } => {
            let mode = if sequential {
                SweepMode::Sequential
            } else {
                SweepMode::Concurrent
            };
            commands::sweep(config, client, limiter, mode, submit).await
        }

        Command::Guess { target_id, flag } => {
            commands::guess(config, &client, &limiter, &target_id, &flag).await
        }

        // These are handled in run() before this function is called
        Command::Strategies { .. }
        | Command::Export { .. }
        | Command::Logs { .. }
        | Command::ClearLogs => {
            unreachable!("Local commands should be handled before API dispatch")
        }
    }
}
