pub mod response;
pub mod session;
pub mod target;
pub mod turn;

pub use response::{
    ClearLogsData, ErrorResponse, ExportData, GuessData, GuessOutcome, LogEntry, LogsData,
    RunData, StrategiesData, StrategyInfo, SuccessResponse, SweepData, TargetsData,
};
pub use session::{ExtractionResult, SweepEntry, SweepReport, Transcript};
pub use target::{Target, TargetOverrides, TargetStatus};
pub use turn::{preview, Turn, TurnLog};
