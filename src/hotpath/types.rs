//! 热路径数据类型：UI 动作、缓存命中项、单帧执行结果

use std::fmt;

use serde::{Deserialize, Serialize};

/// 一次 UI 交互（点击 / 滑动 / 输入等）；核心只关心相等性与字符串形式
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Tap { x: i32, y: i32 },
    LongPress { x: i32, y: i32, duration_ms: u32 },
    Swipe {
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        duration_ms: u32,
    },
    TypeText { text: String },
    Back,
    Home,
    Wait { milliseconds: u32 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tap { x, y } => write!(f, "tap({x},{y})"),
            Action::LongPress { x, y, duration_ms } => {
                write!(f, "long_press({x},{y},{duration_ms}ms)")
            }
            Action::Swipe {
                from_x,
                from_y,
                to_x,
                to_y,
                duration_ms,
            } => write!(
                f,
                "swipe({from_x},{from_y}->{to_x},{to_y},{duration_ms}ms)"
            ),
            Action::TypeText { text } => write!(f, "type({text:?})"),
            Action::Back => write!(f, "back"),
            Action::Home => write!(f, "home"),
            Action::Wait { milliseconds } => write!(f, "wait({milliseconds}ms)"),
        }
    }
}

/// 规则库按 UI 哈希查到的候选动作（只读）
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAction {
    pub action: Action,
    /// 0.0 ~ 1.0
    pub confidence: f32,
    /// 由规则库按自身阈值判定
    pub is_high_confidence: bool,
}

/// 单帧热路径结果：只计数，不持久化
#[derive(Debug, Clone, PartialEq)]
pub enum HotPathResult {
    /// 命中并执行成功
    Hit {
        action: Action,
        confidence: f32,
        ui_hash: String,
        execution_time_ms: u64,
    },
    /// 无匹配（或置信度不足），交由上层决定是否回退 AI
    Miss,
    /// 命中但执行失败；不计入 miss 计数，是否计入由调用方通过 record_failure 决定
    ExecutionFailed { action: Action, reason: String },
}

impl HotPathResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, HotPathResult::Hit { .. })
    }

    /// 审计日志中的结果标签
    pub fn outcome(&self) -> &'static str {
        match self {
            HotPathResult::Hit { .. } => "hit",
            HotPathResult::Miss => "miss",
            HotPathResult::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Tap { x: 10, y: 20 }.to_string(), "tap(10,20)");
        assert_eq!(Action::Back.to_string(), "back");
        assert_eq!(
            Action::TypeText { text: "hi".into() }.to_string(),
            "type(\"hi\")"
        );
    }

    #[test]
    fn test_action_serde_tagged() {
        let json = serde_json::to_value(Action::Tap { x: 1, y: 2 }).unwrap();
        assert_eq!(json["type"], "tap");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, Action::Tap { x: 1, y: 2 });
    }

    #[test]
    fn test_result_outcome_labels() {
        assert_eq!(HotPathResult::Miss.outcome(), "miss");
        let failed = HotPathResult::ExecutionFailed {
            action: Action::Home,
            reason: "boom".into(),
        };
        assert_eq!(failed.outcome(), "execution_failed");
        assert!(!failed.is_hit());
    }
}
