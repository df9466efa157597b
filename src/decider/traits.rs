//! AI 决策抽象
//!
//! 感知 + 推理的慢路径在外部（视觉模型 / LLM）；主循环只在热路径回退时调用 decide。

use async_trait::async_trait;

use crate::core::ActionLogEntry;
use crate::hotpath::Action;
use crate::perception::PerceptionSnapshot;

/// 一次 AI 决策的结果
#[derive(Debug, Clone, PartialEq)]
pub enum AiDecision {
    /// 执行动作；reasoning 用于状态展示
    Act { action: Action, reasoning: String },
    /// 任务已完成
    Finish { summary: String },
    /// AI 判定任务无法完成
    Fail { reason: String },
}

#[async_trait]
pub trait AiDecider: Send + Sync {
    async fn decide(
        &self,
        task: &str,
        snapshot: &PerceptionSnapshot,
        history: &[ActionLogEntry],
    ) -> Result<AiDecision, String>;
}
