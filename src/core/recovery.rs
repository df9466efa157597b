//! 重启退避策略
//!
//! 第 n 次重启（n ≥ 1）前等待 `min(initial * 2^(n-1), max)`；全部使用饱和运算，不会溢出。

use std::time::Duration;

use crate::config::DaemonSection;

/// 指数退避：初始延迟翻倍增长，封顶于最大延迟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self { initial_ms, max_ms }
    }

    pub fn from_config(cfg: &DaemonSection) -> Self {
        Self::new(cfg.initial_backoff_ms, cfg.max_backoff_ms)
    }

    /// 第 attempt 次尝试的等待毫秒数；attempt 为 0 时按 1 处理
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.max(1) - 1;
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.initial_ms.saturating_mul(factor).min(self.max_ms)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(1_000, 30_000)
    }
}
