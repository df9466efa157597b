//! 热路径执行器
//!
//! 每帧：元素集合 → UI 哈希 → 规则库查找 → 高置信度时回放动作；否则返回 Miss 让上层决定是否回退 AI。
//! 连续未命中计数是不衰减的漏桶：任何一次 Hit 清零，Miss 无上限累加，只与阈值比较。
//! 每次执行输出一条结构化审计日志（JSON）。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::daemon::{ActionDispatch, DaemonSession};
use crate::hotpath::{Action, HotPathResult, RuleRegistry, TraceLog, UiHasher};
use crate::perception::{DetectedElement, PerceptionSnapshot};

/// 连续未命中多少帧后建议回退 AI
pub const DEFAULT_AI_FALLBACK_THRESHOLD: u32 = 3;

/// 热路径执行器：计数器为原子量，所有方法取 &self，可由协调器与主循环共享
pub struct HotPathExecutor {
    registry: Arc<dyn RuleRegistry>,
    hasher: Arc<dyn UiHasher>,
    trace: Arc<dyn TraceLog>,
    dispatch: Arc<dyn ActionDispatch>,
    session: Arc<dyn DaemonSession>,
    consecutive_no_match_frames: AtomicU32,
    ai_fallback_threshold: AtomicU32,
}

impl HotPathExecutor {
    pub fn new(
        registry: Arc<dyn RuleRegistry>,
        hasher: Arc<dyn UiHasher>,
        trace: Arc<dyn TraceLog>,
        dispatch: Arc<dyn ActionDispatch>,
        session: Arc<dyn DaemonSession>,
    ) -> Self {
        Self {
            registry,
            hasher,
            trace,
            dispatch,
            session,
            consecutive_no_match_frames: AtomicU32::new(0),
            ai_fallback_threshold: AtomicU32::new(DEFAULT_AI_FALLBACK_THRESHOLD),
        }
    }

    pub fn with_ai_fallback_threshold(self, threshold: u32) -> Self {
        self.set_ai_fallback_threshold(threshold);
        self
    }

    pub fn set_ai_fallback_threshold(&self, threshold: u32) {
        self.ai_fallback_threshold.store(threshold, Ordering::Relaxed);
    }

    pub fn ai_fallback_threshold(&self) -> u32 {
        self.ai_fallback_threshold.load(Ordering::Relaxed)
    }

    pub fn consecutive_no_match_frames(&self) -> u32 {
        self.consecutive_no_match_frames.load(Ordering::Relaxed)
    }

    /// 连续未命中达到阈值（含等于）即为 true，无滞回
    pub fn should_trigger_ai_fallback(&self) -> bool {
        self.consecutive_no_match_frames() >= self.ai_fallback_threshold()
    }

    /// 供主循环在 AI 决策后计算 UI 哈希（与 try_execute 同一哈希函数）
    pub fn compute_hash(&self, snapshot: &PerceptionSnapshot) -> String {
        self.hasher.compute_hash(snapshot)
    }

    fn increment_misses(&self) -> u32 {
        let previous = self
            .consecutive_no_match_frames
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or(u32::MAX);
        previous.saturating_add(1)
    }

    /// 将当前规则集下发给守护进程；规则集为空时不联系守护进程，直接返回 false（不是错误）
    pub async fn configure_daemon(&self) -> bool {
        let rules = self.registry.serialize_rules();
        let trimmed = rules.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            tracing::info!("No hot path rules to configure, skipping daemon call");
            return false;
        }

        match self.session.configure_hot_path(&rules).await {
            Ok(()) => {
                tracing::info!(
                    rule_count = self.registry.rule_count(),
                    "Hot path rules loaded into daemon"
                );
                true
            }
            Err(e) => {
                tracing::warn!("Hot path configuration failed: {}", e);
                false
            }
        }
    }

    /// 单帧热路径决策与执行
    pub async fn try_execute(
        &self,
        detected_elements: &[DetectedElement],
        image_width: u32,
        image_height: u32,
    ) -> HotPathResult {
        if detected_elements.is_empty() {
            let misses = self.increment_misses();
            tracing::debug!(misses, "Hot path miss: empty perception");
            return HotPathResult::Miss;
        }

        let snapshot = PerceptionSnapshot::from_elements(detected_elements, image_width, image_height);
        let ui_hash = self.hasher.compute_hash(&snapshot);

        let cached = match self.registry.lookup_by_hash(&ui_hash) {
            Some(cached) if cached.is_high_confidence => cached,
            other => {
                let misses = self.increment_misses();
                tracing::debug!(
                    ui_hash = %ui_hash,
                    confidence = ?other.map(|c| c.confidence),
                    misses,
                    "Hot path miss"
                );
                return HotPathResult::Miss;
            }
        };

        let start = Instant::now();
        let outcome = self.dispatch_action(&cached.action).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(()) => {
                self.consecutive_no_match_frames.store(0, Ordering::Relaxed);
                HotPathResult::Hit {
                    action: cached.action,
                    confidence: cached.confidence,
                    ui_hash: ui_hash.clone(),
                    execution_time_ms,
                }
            }
            Err(reason) => HotPathResult::ExecutionFailed {
                action: cached.action,
                reason,
            },
        };

        let audit = serde_json::json!({
            "event": "hot_path_audit",
            "outcome": result.outcome(),
            "ui_hash": ui_hash,
            "confidence": cached.confidence,
            "duration_ms": execution_time_ms,
        });
        tracing::info!(audit = %audit.to_string(), "hot_path");

        result
    }

    /// 直注入可用时优先走守护进程，否则走通用执行器；二者只执行其一
    pub async fn dispatch_action(&self, action: &Action) -> Result<(), String> {
        if self.dispatch.is_daemon_available() {
            self.dispatch.execute_daemon_action(action).await
        } else {
            self.dispatch.execute_hot_path_action(action).await
        }
    }

    /// 记录一次成功：写轨迹日志，并增加规则库中该动作的成功计数
    pub fn record_success(&self, ui_hash: &str, action: &Action) {
        self.trace.record_successful_action(ui_hash, action);
        self.registry.increment_success_count(&action.to_string());
    }

    /// 记录一次执行失败：增加规则库失败计数，同时计入连续未命中
    pub fn record_failure(&self, action: &Action) {
        self.registry.increment_failure_count(&action.to_string());
        let misses = self.increment_misses();
        tracing::debug!(action = %action, misses, "Hot path failure recorded");
    }

    pub fn reset(&self) {
        self.consecutive_no_match_frames.store(0, Ordering::Relaxed);
    }
}
