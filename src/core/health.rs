//! 守护进程健康账本
//!
//! 纯值类型，每个 `with_*` 返回新值。计数只增不减；`with_recovery` 清除不健康标记，
//! 历史计数是否一并清零由调用方（`[health] clear_history_on_recovery`）决定。

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DaemonHealth {
    pub crash_count: u32,
    pub restart_count: u32,
    pub ai_call_success_count: u32,
    pub ai_call_failure_count: u32,
    pub hot_path_hit_count: u32,
    pub hot_path_miss_count: u32,
    pub is_healthy: bool,
    pub unhealthy_message: Option<String>,
}

impl Default for DaemonHealth {
    fn default() -> Self {
        Self {
            crash_count: 0,
            restart_count: 0,
            ai_call_success_count: 0,
            ai_call_failure_count: 0,
            hot_path_hit_count: 0,
            hot_path_miss_count: 0,
            is_healthy: true,
            unhealthy_message: None,
        }
    }
}

impl DaemonHealth {
    pub fn with_crash(&self, message: impl Into<String>) -> Self {
        Self {
            crash_count: self.crash_count.saturating_add(1),
            is_healthy: false,
            unhealthy_message: Some(message.into()),
            ..self.clone()
        }
    }

    pub fn with_restart(&self) -> Self {
        Self {
            restart_count: self.restart_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn with_ai_call(&self, success: bool) -> Self {
        let mut next = self.clone();
        if success {
            next.ai_call_success_count = next.ai_call_success_count.saturating_add(1);
        } else {
            next.ai_call_failure_count = next.ai_call_failure_count.saturating_add(1);
        }
        next
    }

    pub fn with_hot_path_hit(&self) -> Self {
        Self {
            hot_path_hit_count: self.hot_path_hit_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn with_hot_path_miss(&self) -> Self {
        Self {
            hot_path_miss_count: self.hot_path_miss_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// 恢复：状态变为健康；clear_history 为 true 时同时清零计数
    pub fn with_recovery(&self, clear_history: bool) -> Self {
        if clear_history {
            return Self::default();
        }
        Self {
            is_healthy: true,
            unhealthy_message: None,
            ..self.clone()
        }
    }

    /// 无 AI 调用时为 None
    pub fn ai_success_rate(&self) -> Option<f64> {
        ratio(self.ai_call_success_count, self.ai_call_failure_count)
    }

    /// 无热路径尝试时为 None
    pub fn hot_path_hit_rate(&self) -> Option<f64> {
        ratio(self.hot_path_hit_count, self.hot_path_miss_count)
    }
}

fn ratio(good: u32, bad: u32) -> Option<f64> {
    let total = u64::from(good) + u64::from(bad);
    (total > 0).then(|| good as f64 / total as f64)
}
