//! 错误类型：守护进程调用错误与自动化会话错误
//!
//! DaemonError 由守护进程协作方（生命周期 / 会话）返回；DaemonCoordinator 只记录日志并转为
//! 结果变体或布尔值，不向外抛出。AutomationError 供 AutomationRunner 内部汇总失败原因。

use thiserror::Error;

/// 守护进程相关操作可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    #[error("Daemon start failed: {0}")]
    StartFailed(String),

    #[error("Daemon connect failed: {0}")]
    ConnectFailed(String),

    #[error("Daemon restart failed: {0}")]
    RestartFailed(String),

    #[error("Daemon stop failed: {0}")]
    StopFailed(String),

    #[error("Hot path configuration rejected: {0}")]
    ConfigureFailed(String),

    /// 重启次数已达上限，不再尝试
    #[error("Restart budget exhausted after {0} attempts")]
    RestartBudgetExhausted(u32),

    /// 会话被取消（退避等待期间）
    #[error("Recovery cancelled")]
    Cancelled,
}

/// 自动化会话级错误（由 AutomationRunner 转为 AutomationResult::Failure）
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("automation unavailable")]
    DaemonUnavailable,

    #[error("daemon recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Frame capture failed: {0}")]
    Perception(String),

    #[error("AI decision failed: {0}")]
    Decision(String),

    #[error("max steps reached")]
    MaxStepsReached,

    #[error("automation cancelled")]
    Cancelled,
}
