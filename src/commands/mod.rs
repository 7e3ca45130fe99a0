pub mod attack;
pub mod maintenance;
pub mod targets;

pub use attack::{run_target, sweep};
pub use maintenance::{clear_logs, list_strategies, show_export, show_logs};
pub use targets::{api_policy, guess, list_targets, resolve_targets, submit_guess};
