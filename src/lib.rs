//! Autopilot - 移动端 UI 自动化热路径引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话状态与健康账本、退避、会话监管、优雅关闭、组件装配、主循环
//! - **daemon**: 守护进程协作方抽象、协调器（可用性 + 崩溃恢复）、Mock 守护进程
//! - **decider**: AI 决策（慢路径）抽象与 Mock
//! - **hotpath**: UI 哈希、规则库、轨迹日志、热路径执行器
//! - **observability**: tracing 日志初始化
//! - **perception**: 感知结果（检测到的 UI 元素）与帧来源

pub mod config;
pub mod core;
pub mod daemon;
pub mod decider;
pub mod hotpath;
pub mod observability;
pub mod perception;

pub use crate::core::{AutomationBuilder, AutomationRunner, AutomationStateManager};
pub use crate::daemon::DaemonCoordinator;
pub use crate::hotpath::HotPathExecutor;
