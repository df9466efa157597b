//! 守护进程协调器：可用性判断与崩溃恢复
//!
//! - ensure_ready：最多一次 start + 一次 connect，不在内部循环重试（重试由调用方决定）
//! - handle_crash：唯一带自动重试预算的地方；指数退避后 restart → connect → 重新下发热路径规则
//! - 退避等待与会话取消令牌竞争，取消后不再联系守护进程

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DaemonSection;
use crate::core::{BackoffPolicy, DaemonError};
use crate::daemon::{DaemonLifecycle, DaemonSession};
use crate::hotpath::HotPathExecutor;

/// ensure_ready 的结果；每次调用独立，不持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCoordinationResult {
    Ready,
    NotAvailable,
    RecoveryFailed { reason: String },
}

/// 一次崩溃恢复的结果：成功标志 + 可选失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub recovered: bool,
    pub reason: Option<String>,
}

impl RecoveryOutcome {
    fn success() -> Self {
        Self {
            recovered: true,
            reason: None,
        }
    }

    fn failed(err: DaemonError) -> Self {
        Self {
            recovered: false,
            reason: Some(err.to_string()),
        }
    }

    pub fn into_coordination_result(self) -> DaemonCoordinationResult {
        if self.recovered {
            DaemonCoordinationResult::Ready
        } else {
            DaemonCoordinationResult::RecoveryFailed {
                reason: self.reason.unwrap_or_else(|| "unknown".to_string()),
            }
        }
    }
}

/// 每个自动化会话一个实例，由主循环持有
pub struct DaemonCoordinator {
    lifecycle: Arc<dyn DaemonLifecycle>,
    session: Arc<dyn DaemonSession>,
    hot_path: Arc<HotPathExecutor>,
    backoff: BackoffPolicy,
    max_restart_attempts: u32,
    restart_attempts: AtomicU32,
    cancel_token: CancellationToken,
}

impl DaemonCoordinator {
    pub fn new(
        lifecycle: Arc<dyn DaemonLifecycle>,
        session: Arc<dyn DaemonSession>,
        hot_path: Arc<HotPathExecutor>,
        cfg: &DaemonSection,
    ) -> Self {
        Self {
            lifecycle,
            session,
            hot_path,
            backoff: BackoffPolicy::from_config(cfg),
            max_restart_attempts: cfg.max_restart_attempts,
            restart_attempts: AtomicU32::new(0),
            cancel_token: CancellationToken::new(),
        }
    }

    /// 绑定会话取消令牌（通常为 SessionSupervisor 的子 token）
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// 连接状态为 Ready 时才可用
    pub fn is_daemon_available(&self) -> bool {
        self.session.connection_state().is_ready()
    }

    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts.load(Ordering::Relaxed)
    }

    pub fn max_restart_attempts(&self) -> u32 {
        self.max_restart_attempts
    }

    pub async fn ensure_ready(&self) -> DaemonCoordinationResult {
        if self.is_daemon_available() {
            return DaemonCoordinationResult::Ready;
        }

        if !self.lifecycle.is_running().await {
            tracing::info!("Daemon not running, starting");
            if let Err(e) = self.lifecycle.start().await {
                tracing::warn!("Daemon start failed: {}", e);
                return DaemonCoordinationResult::NotAvailable;
            }
        }

        if let Err(e) = self.session.connect().await {
            tracing::warn!("Daemon connect failed: {}", e);
            return DaemonCoordinationResult::NotAvailable;
        }

        if self.is_daemon_available() {
            tracing::info!("Daemon ready");
            DaemonCoordinationResult::Ready
        } else {
            tracing::warn!(
                state = ?self.session.connection_state(),
                "Daemon connected but not ready"
            );
            DaemonCoordinationResult::NotAvailable
        }
    }

    /// 崩溃恢复，返回是否恢复成功
    pub async fn handle_crash(&self) -> bool {
        self.handle_crash_with_reason().await.recovered
    }

    /// 崩溃恢复，失败时附带原因
    pub async fn handle_crash_with_reason(&self) -> RecoveryOutcome {
        match self.recover().await {
            Ok(()) => RecoveryOutcome::success(),
            Err(e) => RecoveryOutcome::failed(e),
        }
    }

    async fn recover(&self) -> Result<(), DaemonError> {
        let used = self.restart_attempts();
        if used >= self.max_restart_attempts {
            tracing::warn!(
                attempts = used,
                max = self.max_restart_attempts,
                "Daemon restart budget exhausted"
            );
            return Err(DaemonError::RestartBudgetExhausted(used));
        }
        if self.cancel_token.is_cancelled() {
            return Err(DaemonError::Cancelled);
        }

        let attempt = self.restart_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.backoff.delay(attempt);
        tracing::info!(
            attempt,
            max = self.max_restart_attempts,
            delay_ms = delay.as_millis() as u64,
            "Daemon crashed, restarting after backoff"
        );

        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => {
                tracing::info!(attempt, "Daemon recovery cancelled during backoff");
                return Err(DaemonError::Cancelled);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Err(e) = self.lifecycle.restart().await {
            tracing::warn!(attempt, "Daemon restart failed: {}", e);
            return Err(e);
        }
        self.bail_if_cancelled(attempt, "restart")?;
        if let Err(e) = self.session.connect().await {
            tracing::warn!(attempt, "Daemon reconnect failed: {}", e);
            return Err(e);
        }
        self.bail_if_cancelled(attempt, "reconnect")?;

        // 重新下发规则失败不影响恢复结果
        if !self.configure_hot_path().await {
            tracing::debug!(attempt, "Hot path rules not re-armed after restart");
        }
        tracing::info!(attempt, "Daemon recovered");
        Ok(())
    }

    /// 取消之后不再联系守护进程
    fn bail_if_cancelled(&self, attempt: u32, after: &str) -> Result<(), DaemonError> {
        if self.cancel_token.is_cancelled() {
            tracing::info!(attempt, after, "Daemon recovery cancelled");
            return Err(DaemonError::Cancelled);
        }
        Ok(())
    }

    /// 返回守护进程当前是否已加载规则
    pub async fn configure_hot_path(&self) -> bool {
        self.hot_path.configure_daemon().await
    }

    /// 尽力而为
    pub async fn stop_automation(&self) {
        if let Err(e) = self.session.stop_automation().await {
            tracing::warn!("Daemon stop automation failed: {}", e);
        }
    }

    /// 停止自动化并关闭守护进程（进程退出清理用）
    pub async fn shutdown(&self) {
        self.stop_automation().await;
        if let Err(e) = self.lifecycle.stop().await {
            tracing::warn!("Daemon stop failed: {}", e);
        }
    }

    pub fn reset(&self) {
        self.restart_attempts.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::MockDaemon;
    use crate::hotpath::{
        Action, ElementHasher, InMemoryRuleRegistry, NoopTraceLog,
    };
    use std::time::{Duration, Instant};

    fn daemon_cfg(max: u32) -> DaemonSection {
        DaemonSection {
            max_restart_attempts: max,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    fn build(
        daemon: Arc<MockDaemon>,
        cfg: &DaemonSection,
    ) -> (DaemonCoordinator, Arc<InMemoryRuleRegistry>) {
        let registry = Arc::new(InMemoryRuleRegistry::new());
        let executor = Arc::new(HotPathExecutor::new(
            registry.clone(),
            Arc::new(ElementHasher),
            Arc::new(NoopTraceLog),
            daemon.clone(),
            daemon.clone(),
        ));
        let coordinator = DaemonCoordinator::new(daemon.clone(), daemon, executor, cfg);
        (coordinator, registry)
    }

    #[tokio::test]
    async fn test_ensure_ready_idempotent_when_ready() {
        let daemon = Arc::new(MockDaemon::ready());
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert_eq!(coordinator.ensure_ready().await, DaemonCoordinationResult::Ready);
        assert_eq!(coordinator.ensure_ready().await, DaemonCoordinationResult::Ready);
        assert_eq!(daemon.start_calls(), 0);
        assert_eq!(daemon.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_ready_starts_and_connects() {
        let daemon = Arc::new(MockDaemon::new());
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert!(!coordinator.is_daemon_available());
        assert_eq!(coordinator.ensure_ready().await, DaemonCoordinationResult::Ready);
        assert_eq!(daemon.start_calls(), 1);
        assert_eq!(daemon.connect_calls(), 1);
        assert!(coordinator.is_daemon_available());
    }

    #[tokio::test]
    async fn test_ensure_ready_start_failure_skips_connect() {
        let daemon = Arc::new(MockDaemon::new());
        daemon.set_fail_start(true);
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert_eq!(
            coordinator.ensure_ready().await,
            DaemonCoordinationResult::NotAvailable
        );
        assert_eq!(daemon.start_calls(), 1);
        assert_eq!(daemon.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_ready_connect_failure() {
        let daemon = Arc::new(MockDaemon::new());
        daemon.set_fail_connect(true);
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert_eq!(
            coordinator.ensure_ready().await,
            DaemonCoordinationResult::NotAvailable
        );
        assert_eq!(daemon.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_ensure_ready_connected_but_not_ready() {
        let daemon = Arc::new(MockDaemon::new());
        daemon.set_connect_stalls(true);
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert_eq!(
            coordinator.ensure_ready().await,
            DaemonCoordinationResult::NotAvailable
        );
        // 不在内部重试
        assert_eq!(daemon.start_calls(), 1);
        assert_eq!(daemon.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_crash_recovers_and_rearms() {
        let daemon = Arc::new(MockDaemon::ready());
        let (coordinator, registry) = build(daemon.clone(), &daemon_cfg(3));
        registry.learn("H1", Action::Back, 0.9);
        daemon.crash();

        assert!(coordinator.handle_crash().await);
        assert_eq!(coordinator.restart_attempts(), 1);
        assert_eq!(daemon.restart_calls(), 1);
        assert_eq!(daemon.connect_calls(), 1);
        assert_eq!(daemon.configure_calls(), 1);
        assert!(coordinator.is_daemon_available());
    }

    #[tokio::test]
    async fn test_handle_crash_rearm_failure_still_recovers() {
        let daemon = Arc::new(MockDaemon::ready());
        let (coordinator, registry) = build(daemon.clone(), &daemon_cfg(3));
        registry.learn("H1", Action::Back, 0.9);
        daemon.set_fail_configure(true);
        assert!(coordinator.handle_crash().await);
    }

    #[tokio::test]
    async fn test_handle_crash_budget_exhausted() {
        let daemon = Arc::new(MockDaemon::ready());
        daemon.set_fail_restart(true);
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(2));

        assert!(!coordinator.handle_crash().await);
        assert!(!coordinator.handle_crash().await);
        assert_eq!(daemon.restart_calls(), 2);

        for _ in 0..3 {
            let outcome = coordinator.handle_crash_with_reason().await;
            assert!(!outcome.recovered);
            assert!(outcome.reason.unwrap().contains("budget exhausted"));
        }
        assert_eq!(daemon.restart_calls(), 2);
        assert_eq!(daemon.connect_calls(), 0);
        assert_eq!(coordinator.restart_attempts(), 2);

        coordinator.reset();
        assert_eq!(coordinator.restart_attempts(), 0);
        daemon.set_fail_restart(false);
        assert!(coordinator.handle_crash().await);
    }

    #[tokio::test]
    async fn test_handle_crash_reconnect_failure() {
        let daemon = Arc::new(MockDaemon::ready());
        daemon.set_fail_connect(true);
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        let outcome = coordinator.handle_crash_with_reason().await;
        assert!(!outcome.recovered);
        assert_eq!(daemon.restart_calls(), 1);
        assert_eq!(daemon.configure_calls(), 0);
        assert!(matches!(
            outcome.into_coordination_result(),
            DaemonCoordinationResult::RecoveryFailed { reason } if reason.contains("connect")
        ));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_aborts_without_daemon_calls() {
        let daemon = Arc::new(MockDaemon::ready());
        let cfg = DaemonSection {
            max_restart_attempts: 3,
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
        };
        let token = CancellationToken::new();
        let (coordinator, _) = build(daemon.clone(), &cfg);
        let coordinator = Arc::new(coordinator.with_cancel_token(token.clone()));

        let started = Instant::now();
        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.handle_crash_with_reason().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let outcome = task.await.unwrap();
        assert!(!outcome.recovered);
        assert_eq!(outcome.reason.as_deref(), Some("Recovery cancelled"));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(daemon.restart_calls(), 0);
        assert_eq!(daemon.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_consume_budget() {
        let daemon = Arc::new(MockDaemon::ready());
        let token = CancellationToken::new();
        token.cancel();
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        let coordinator = coordinator.with_cancel_token(token);
        assert!(!coordinator.handle_crash().await);
        assert_eq!(coordinator.restart_attempts(), 0);
        assert_eq!(daemon.restart_calls(), 0);
    }

    /// restart 返回的同时会话被取消
    struct CancelOnRestart {
        inner: Arc<MockDaemon>,
        token: CancellationToken,
    }

    #[async_trait::async_trait]
    impl DaemonLifecycle for CancelOnRestart {
        async fn is_running(&self) -> bool {
            self.inner.is_running().await
        }

        async fn start(&self) -> Result<(), DaemonError> {
            self.inner.start().await
        }

        async fn restart(&self) -> Result<(), DaemonError> {
            let result = self.inner.restart().await;
            self.token.cancel();
            result
        }

        async fn stop(&self) -> Result<(), DaemonError> {
            self.inner.stop().await
        }
    }

    #[tokio::test]
    async fn test_cancel_during_restart_skips_reconnect() {
        let daemon = Arc::new(MockDaemon::ready());
        let token = CancellationToken::new();
        let registry = Arc::new(InMemoryRuleRegistry::new());
        registry.learn("H1", Action::Back, 0.9);
        let executor = Arc::new(HotPathExecutor::new(
            registry,
            Arc::new(ElementHasher),
            Arc::new(NoopTraceLog),
            daemon.clone(),
            daemon.clone(),
        ));
        let lifecycle = Arc::new(CancelOnRestart {
            inner: daemon.clone(),
            token: token.clone(),
        });
        let coordinator =
            DaemonCoordinator::new(lifecycle, daemon.clone(), executor, &daemon_cfg(3))
                .with_cancel_token(token);

        let outcome = coordinator.handle_crash_with_reason().await;

        assert!(!outcome.recovered);
        assert_eq!(outcome.reason.as_deref(), Some("Recovery cancelled"));
        assert_eq!(daemon.restart_calls(), 1);
        assert_eq!(daemon.connect_calls(), 0);
        assert_eq!(daemon.configure_calls(), 0);
    }

    #[tokio::test]
    async fn test_configure_hot_path_empty_registry() {
        let daemon = Arc::new(MockDaemon::ready());
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        assert!(!coordinator.configure_hot_path().await);
        assert_eq!(daemon.configure_calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_and_shutdown() {
        let daemon = Arc::new(MockDaemon::ready());
        let (coordinator, _) = build(daemon.clone(), &daemon_cfg(3));
        coordinator.stop_automation().await;
        assert_eq!(daemon.stop_automation_calls(), 1);
        coordinator.shutdown().await;
        assert_eq!(daemon.stop_automation_calls(), 2);
        assert_eq!(daemon.stop_calls(), 1);
        assert!(!coordinator.is_daemon_available());
    }
}
