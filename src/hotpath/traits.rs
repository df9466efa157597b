//! 热路径外部协作方抽象
//!
//! UI 哈希函数、规则库（按哈希查找 + 计数）、成功轨迹日志。核心只依赖这些契约，不关心实现。

use crate::hotpath::{Action, CachedAction};
use crate::perception::PerceptionSnapshot;

/// UI 哈希：相同输入必须得到相同 key
pub trait UiHasher: Send + Sync {
    fn compute_hash(&self, snapshot: &PerceptionSnapshot) -> String;
}

/// 动作缓存 / 规则库
pub trait RuleRegistry: Send + Sync {
    fn lookup_by_hash(&self, ui_hash: &str) -> Option<CachedAction>;

    /// 序列化为下发给守护进程的格式；空规则集为空串或 "[]"
    fn serialize_rules(&self) -> String;

    fn rule_count(&self) -> usize;

    /// key 为动作的字符串形式
    fn increment_success_count(&self, key: &str);

    fn increment_failure_count(&self, key: &str);

    /// 从 AI 成功动作学习新规则；只读规则库可忽略
    fn learn_rule(&self, _ui_hash: &str, _action: &Action, _confidence: f32) {}
}

/// 成功动作轨迹（只追加，尽力而为）
pub trait TraceLog: Send + Sync {
    fn record_successful_action(&self, ui_hash: &str, action: &Action);
}
