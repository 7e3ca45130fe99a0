// CLI Parser - Clap derive definitions

use clap::{Parser, Subcommand};

use crate::strategy::StrategyKind;

/// ctf-raider: Multi-target prompt-injection attack client
#[derive(Parser, Debug)]
#[command(name = "ctf-raider")]
#[command(version)]
#[command(about = "Multi-target prompt-injection attack client for CTF chat services")]
pub struct Cli {
    /// Log level for progress output on stderr (overridden by RUST_LOG)
    #[arg(long, global = true, env = "CTF_RAIDER_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List attackable targets
    Targets,

    /// Attack a single target until it leaks a flag or runs out of budget
    Run {
        /// Target ID
        target_id: String,
        /// Submit a captured flag as a guess
        #[arg(long)]
        submit: bool,
    },

    /// Attack every target
    Sweep {
        /// Attack targets one after another instead of concurrently
        #[arg(long)]
        sequential: bool,
        /// Submit captured flags as guesses
        #[arg(long)]
        submit: bool,
    },

    /// Submit a flag guess for a target
    Guess {
        /// Target ID
        target_id: String,
        /// Flag to submit
        flag: String,
    },

    /// List the strategy catalog
    Strategies {
        /// Show a single strategy
        #[arg(value_parser = parse_strategy)]
        name: Option<StrategyKind>,
    },

    /// Show saved transcripts
    Export {
        /// Transcript file (defaults to the data directory)
        #[arg(long)]
        path: Option<String>,
    },

    /// View operation logs
    Logs {
        /// Number of log entries
        #[arg(default_value = "50")]
        n: usize,
        /// Filter by operation type
        operation: Option<String>,
    },

    /// Clear all logs
    ClearLogs,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    s.parse::<StrategyKind>().map_err(|e| format!("{}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ctf-raider", "run", "team-1", "--submit"]).unwrap();
        match cli.command {
            Command::Run { target_id, submit } => {
                assert_eq!(target_id, "team-1");
                assert!(submit);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sweep_defaults() {
        let cli = Cli::try_parse_from(["ctf-raider", "sweep"]).unwrap();
        match cli.command {
            Command::Sweep { sequential, submit } => {
                assert!(!sequential);
                assert!(!submit);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_strategy_name() {
        let cli = Cli::try_parse_from(["ctf-raider", "strategies", "role-play-pretext"]).unwrap();
        match cli.command {
            Command::Strategies { name } => assert_eq!(name, Some(StrategyKind::RolePlayPretext)),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["ctf-raider", "strategies", "bribery"]).is_err());
    }

    #[test]
    fn test_parse_logs_defaults() {
        let cli = Cli::try_parse_from(["ctf-raider", "logs"]).unwrap();
        match cli.command {
            Command::Logs { n, operation } => {
                assert_eq!(n, 50);
                assert!(operation.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_guess_requires_flag() {
        assert!(Cli::try_parse_from(["ctf-raider", "guess", "team-1"]).is_err());
    }
}
