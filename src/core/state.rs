//! 会话状态定义：AutomationState 与对外发布的快照
//!
//! 三个变体互斥：Idle → Running → Completed →（reset）→ Idle。迁移不做合法性校验，由编排方负责。

use serde::{Deserialize, Serialize};

use crate::core::DaemonHealth;
use crate::hotpath::Action;

/// 自动化模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationMode {
    /// 热路径优先，连续未命中后回退 AI
    #[default]
    Hybrid,
    /// 只回放缓存动作，从不调用 AI
    HotPathOnly,
    /// 每步都由 AI 决策
    AiOnly,
}

/// AI 决策子状态（UI 展示用）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDecisionMode {
    #[default]
    Idle,
    Analyzing,
    Acting,
}

/// 当前步所处阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Perceiving,
    HotPath,
    Reasoning,
    Executing,
    Recovering,
}

/// 动作来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    HotPath,
    Ai,
}

/// 动作历史中的一条
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionLogEntry {
    pub step: usize,
    pub action: Action,
    pub source: ActionSource,
    pub success: bool,
    pub timestamp_ms: i64,
}

impl ActionLogEntry {
    pub fn new(step: usize, action: Action, source: ActionSource, success: bool) -> Self {
        Self {
            step,
            action,
            source,
            success,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Running 变体的完整负载；update_running 整体替换
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunningState {
    pub task_description: String,
    pub current_step: usize,
    pub max_steps: usize,
    pub phase: StepPhase,
    pub last_action: Option<Action>,
    pub action_history: Vec<ActionLogEntry>,
    pub current_reasoning: Option<String>,
    pub start_time_ms: i64,
    pub step_start_time_ms: i64,
    pub retry_attempt: u32,
    pub retry_reason: Option<String>,
}

impl RunningState {
    /// 新会话的第 0 步
    pub fn new(task_description: impl Into<String>, max_steps: usize) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            task_description: task_description.into(),
            current_step: 0,
            max_steps,
            phase: StepPhase::Perceiving,
            last_action: None,
            action_history: Vec::new(),
            current_reasoning: None,
            start_time_ms: now,
            step_start_time_ms: now,
            retry_attempt: 0,
            retry_reason: None,
        }
    }
}

/// 会话结束结果
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AutomationResult {
    Success { summary: String, steps: usize },
    Failure { reason: String, steps: usize },
    Cancelled { steps: usize },
}

impl AutomationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AutomationResult::Success { .. })
    }

    pub fn steps(&self) -> usize {
        match self {
            AutomationResult::Success { steps, .. }
            | AutomationResult::Failure { steps, .. }
            | AutomationResult::Cancelled { steps } => *steps,
        }
    }
}

/// 会话生命周期状态，任一时刻只有一个变体
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutomationState {
    #[default]
    Idle,
    Running(RunningState),
    Completed { result: AutomationResult },
}

impl AutomationState {
    pub fn is_running(&self) -> bool {
        matches!(self, AutomationState::Running(_))
    }
}

/// 对外发布的不可变快照：每次更新整体替换
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AutomationSnapshot {
    pub state: AutomationState,
    pub automation_mode: AutomationMode,
    pub ai_decision_mode: AiDecisionMode,
    pub health: DaemonHealth,
}
