/*
[INPUT]:  Public API exports for stopline-strategy crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod server;
pub mod task;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use controller::{ControlReply, PositionStatus, StatusReport, TaskController};
pub use error::{ErrorCode, TaskError};
pub use server::{AppState, create_router};
pub use task::{
    BartDropParams, BartDropTask, ExitValueParams, LineBreakParams, LineBreakTask, StrategyKind,
    StrategyTask, TaskContext, TaskExplain, TaskPhase, TaskTiming,
};
