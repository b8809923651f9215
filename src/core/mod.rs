pub mod types;

pub use types::{CommandRequest, ExitOutcome, Mode, RunResult, TargetReply, EXIT_CODE_UNKNOWN};
