//! 内存规则库：UI 哈希 → 缓存动作
//!
//! 置信度 = (初始置信度 × PRIOR_WEIGHT + 成功次数) / (PRIOR_WEIGHT + 总次数)，
//! 失败会把规则拉到高置信阈值以下，从而让热路径放弃它（不删除规则）。

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::hotpath::{Action, CachedAction, RuleRegistry};

/// 热路径只回放置信度不低于此值的规则
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.8;

const PRIOR_WEIGHT: f32 = 4.0;

/// 单条规则
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub ui_hash: String,
    pub action: Action,
    pub seed_confidence: f32,
    pub success_count: u32,
    pub failure_count: u32,
}

impl Rule {
    pub fn confidence(&self) -> f32 {
        let total = (u64::from(self.success_count) + u64::from(self.failure_count)) as f32;
        let score = (self.seed_confidence * PRIOR_WEIGHT + self.success_count as f32)
            / (PRIOR_WEIGHT + total);
        score.clamp(0.0, 1.0)
    }
}

/// 规则下发格式
#[derive(Serialize)]
struct WireRule<'a> {
    ui_hash: &'a str,
    action: &'a Action,
    confidence: f32,
}

#[derive(Debug, Default)]
pub struct InMemoryRuleRegistry {
    rules: RwLock<HashMap<String, Rule>>,
}

impl InMemoryRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Rule>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Rule>> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 学习一条规则；同一哈希已有规则时覆盖并清零计数
    pub fn learn(&self, ui_hash: impl Into<String>, action: Action, confidence: f32) {
        let ui_hash = ui_hash.into();
        let rule = Rule {
            ui_hash: ui_hash.clone(),
            action,
            seed_confidence: confidence.clamp(0.0, 1.0),
            success_count: 0,
            failure_count: 0,
        };
        tracing::debug!(ui_hash = %ui_hash, action = %rule.action, "Rule learned");
        self.write().insert(ui_hash, rule);
    }

    pub fn rule(&self, ui_hash: &str) -> Option<Rule> {
        self.read().get(ui_hash).cloned()
    }

    fn bump(&self, key: &str, success: bool) {
        let mut rules = self.write();
        for rule in rules.values_mut().filter(|r| r.action.to_string() == key) {
            if success {
                rule.success_count = rule.success_count.saturating_add(1);
            } else {
                rule.failure_count = rule.failure_count.saturating_add(1);
            }
        }
    }
}

impl RuleRegistry for InMemoryRuleRegistry {
    fn lookup_by_hash(&self, ui_hash: &str) -> Option<CachedAction> {
        self.read().get(ui_hash).map(|rule| {
            let confidence = rule.confidence();
            CachedAction {
                action: rule.action.clone(),
                confidence,
                is_high_confidence: confidence >= HIGH_CONFIDENCE_THRESHOLD,
            }
        })
    }

    fn serialize_rules(&self) -> String {
        let rules = self.read();
        let mut wire: Vec<WireRule<'_>> = rules
            .values()
            .map(|r| WireRule {
                ui_hash: &r.ui_hash,
                action: &r.action,
                confidence: r.confidence(),
            })
            .collect();
        wire.sort_by(|a, b| a.ui_hash.cmp(b.ui_hash));
        serde_json::to_string(&wire).unwrap_or_else(|_| "[]".to_string())
    }

    fn rule_count(&self) -> usize {
        self.read().len()
    }

    fn increment_success_count(&self, key: &str) {
        self.bump(key, true);
    }

    fn increment_failure_count(&self, key: &str) {
        self.bump(key, false);
    }

    fn learn_rule(&self, ui_hash: &str, action: &Action, confidence: f32) {
        self.learn(ui_hash, action.clone(), confidence);
    }
}
