//! 守护进程协作方抽象
//!
//! 守护进程（截屏 / 注入输入的原生引擎）及其 IPC 在外部。核心只消费：连接状态快照、
//! 进程生命周期（start / restart / stop）、会话操作（connect / 下发规则 / 停止自动化）与动作分发。
//! 每个调用都可能独立失败。

use async_trait::async_trait;

use crate::core::DaemonError;
use crate::hotpath::Action;

/// 守护进程连接状态；只有 Ready 表示可用
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed(String),
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

/// 进程生命周期
#[async_trait]
pub trait DaemonLifecycle: Send + Sync {
    async fn is_running(&self) -> bool;

    async fn start(&self) -> Result<(), DaemonError>;

    async fn restart(&self) -> Result<(), DaemonError>;

    async fn stop(&self) -> Result<(), DaemonError>;
}

/// 客户端会话（连接状态源 + IPC 操作）
#[async_trait]
pub trait DaemonSession: Send + Sync {
    /// 当前连接状态（只读快照）
    fn connection_state(&self) -> ConnectionState;

    async fn connect(&self) -> Result<(), DaemonError>;

    /// 下发序列化后的热路径规则集
    async fn configure_hot_path(&self, serialized_rules: &str) -> Result<(), DaemonError>;

    async fn stop_automation(&self) -> Result<(), DaemonError>;
}

/// 动作执行：守护进程直注入（低延迟）与通用热路径执行器两条路径
#[async_trait]
pub trait ActionDispatch: Send + Sync {
    /// 直注入路径当前是否可用
    fn is_daemon_available(&self) -> bool;

    async fn execute_daemon_action(&self, action: &Action) -> Result<(), String>;

    async fn execute_hot_path_action(&self, action: &Action) -> Result<(), String>;
}
