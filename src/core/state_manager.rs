//! 会话状态管理器：单写多读的状态与健康账本
//!
//! 通过 watch 通道发布不可变快照，每次更新整体替换，读者不会看到半更新的值。
//! 不做迁移合法性校验（任何方法可在任何状态调用），合法性由编排方保证。

use tokio::sync::watch;

use crate::config::HealthSection;
use crate::core::{
    AiDecisionMode, AutomationMode, AutomationResult, AutomationSnapshot, AutomationState,
    DaemonHealth, RunningState,
};

pub struct AutomationStateManager {
    tx: watch::Sender<AutomationSnapshot>,
    clear_history_on_recovery: bool,
}

impl AutomationStateManager {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AutomationSnapshot::default());
        Self {
            tx,
            clear_history_on_recovery: false,
        }
    }

    pub fn from_config(cfg: &HealthSection) -> Self {
        Self {
            clear_history_on_recovery: cfg.clear_history_on_recovery,
            ..Self::new()
        }
    }

    /// 订阅快照变化（UI 等观察者）
    pub fn subscribe(&self) -> watch::Receiver<AutomationSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AutomationSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> AutomationState {
        self.tx.borrow().state.clone()
    }

    pub fn health(&self) -> DaemonHealth {
        self.tx.borrow().health.clone()
    }

    pub fn automation_mode(&self) -> AutomationMode {
        self.tx.borrow().automation_mode
    }

    pub fn ai_decision_mode(&self) -> AiDecisionMode {
        self.tx.borrow().ai_decision_mode
    }

    fn publish(&self, update: impl FnOnce(&AutomationSnapshot) -> AutomationSnapshot) {
        self.tx.send_modify(|current| {
            let next = update(current);
            *current = next;
        });
    }

    /// 回到 Idle、默认模式，并执行健康账本的恢复
    pub fn reset(&self) {
        let clear = self.clear_history_on_recovery;
        self.publish(|s| AutomationSnapshot {
            state: AutomationState::Idle,
            automation_mode: AutomationMode::default(),
            ai_decision_mode: AiDecisionMode::default(),
            health: s.health.with_recovery(clear),
        });
    }

    pub fn set_mode(&self, mode: AutomationMode) {
        self.publish(|s| AutomationSnapshot {
            automation_mode: mode,
            ..s.clone()
        });
    }

    pub fn set_ai_decision_mode(&self, mode: AiDecisionMode) {
        self.publish(|s| AutomationSnapshot {
            ai_decision_mode: mode,
            ..s.clone()
        });
    }

    /// 整体替换 Running 负载（不合并）；从 Idle / Completed 调用也会进入 Running
    pub fn update_running(&self, running: RunningState) {
        self.publish(|s| AutomationSnapshot {
            state: AutomationState::Running(running),
            ..s.clone()
        });
    }

    pub fn complete(&self, result: AutomationResult) {
        tracing::info!(result = ?result, "Automation completed");
        self.publish(|s| AutomationSnapshot {
            state: AutomationState::Completed { result },
            ai_decision_mode: AiDecisionMode::Idle,
            ..s.clone()
        });
    }

    pub fn record_crash(&self, message: impl Into<String>) {
        let message = message.into();
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_crash(message),
            ..s.clone()
        });
    }

    pub fn record_restart(&self) {
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_restart(),
            ..s.clone()
        });
    }

    pub fn record_ai_call(&self, success: bool) {
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_ai_call(success),
            ..s.clone()
        });
    }

    pub fn record_hot_path_hit(&self) {
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_hot_path_hit(),
            ..s.clone()
        });
    }

    pub fn record_hot_path_miss(&self) {
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_hot_path_miss(),
            ..s.clone()
        });
    }

    pub fn record_recovery(&self) {
        let clear = self.clear_history_on_recovery;
        self.publish(|s| AutomationSnapshot {
            health: s.health.with_recovery(clear),
            ..s.clone()
        });
    }
}

impl Default for AutomationStateManager {
    fn default() -> Self {
        Self::new()
    }
}
