//! 核心层：错误、退避、会话状态与健康账本、会话监管、优雅关闭、组件装配与主循环

pub mod builder;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod shutdown;
pub mod state;
pub mod state_manager;

pub use builder::AutomationBuilder;
pub use error::{AutomationError, DaemonError};
pub use health::DaemonHealth;
pub use orchestrator::{AutomationRunner, RunnerParts};
pub use recovery::BackoffPolicy;
pub use session_supervisor::SessionSupervisor;
pub use shutdown::{
    run_with_graceful_shutdown, DaemonStopCleanup, ShutdownCleanup, ShutdownCoordinator,
    ShutdownManager, ShutdownReason,
};
pub use state::{
    ActionLogEntry, ActionSource, AiDecisionMode, AutomationMode, AutomationResult,
    AutomationSnapshot, AutomationState, RunningState, StepPhase,
};
pub use state_manager::AutomationStateManager;
