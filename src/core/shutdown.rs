//! 优雅关闭
//!
//! 统一的关闭信号（Ctrl+C / SIGTERM）与清理流程：
//! - 正在进行的会话通过关闭 token 取消（包括守护进程重启前的退避等待）
//! - 收到信号后给会话留出收尾时间，让其以 Cancelled 结束并写入状态
//! - 清理任务逐个执行，各自受超时约束（如停止守护进程自动化）

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::daemon::DaemonCoordinator;

/// 收到关闭信号后等待应用自行结束的上限
const APP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 关闭信号管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    /// 关闭信号 token（会话监管以其为父 token）
    shutdown_token: CancellationToken,
}

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户发起的退出 (Ctrl+C)
    UserInitiated,
    /// SIGTERM 信号
    Signal,
}

impl ShutdownManager {
    /// 创建新的关闭管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取关闭 token（用于取消正在进行的会话）
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// 触发关闭
    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(reason = ?reason, "Shutdown requested");
        self.shutdown_token.cancel();
    }

    /// 是否已触发关闭
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 等待关闭信号
    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 关闭时需要执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    /// 执行清理，返回清理是否成功
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 清理任务名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 关闭协调器：按注册顺序执行清理任务
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    /// 单个清理任务超时（秒）
    timeout_secs: u64,
}

impl ShutdownCoordinator {
    /// 创建新的关闭协调器（默认每个任务 5 秒超时）
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout_secs: 5,
        }
    }

    /// 设置清理超时时间
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// 注册清理任务
    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    /// 执行所有清理任务；失败或超时只记日志，不影响后续任务
    pub async fn run_cleanup(&self) {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());

        let timeout = Duration::from_secs(self.timeout_secs);

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(timeout, task.cleanup()).await {
                Ok(Ok(())) => {
                    tracing::info!("Cleanup task '{}' completed successfully", name);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Cleanup task '{}' failed: {}", name, e);
                }
                Err(_) => {
                    tracing::warn!("Cleanup task '{}' timed out after {}s", name, self.timeout_secs);
                }
            }
        }

        tracing::info!("All cleanup tasks finished");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 停止守护进程自动化并关闭守护进程
pub struct DaemonStopCleanup {
    coordinator: Arc<DaemonCoordinator>,
}

impl DaemonStopCleanup {
    pub fn new(coordinator: Arc<DaemonCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for DaemonStopCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.coordinator.shutdown().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Daemon"
    }
}

/// 运行主应用直到完成或收到关闭信号，然后执行清理
///
/// 收到信号时不直接丢弃应用 future：应用持有关闭 token 的子 token，
/// 在 APP_DRAIN_TIMEOUT 内等待它自行以取消结束（会话因此能写入 Cancelled 结果）。
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();
    drive_app(&shutdown_manager, app, APP_DRAIN_TIMEOUT).await;
    cleanup().await;
}

async fn drive_app<F>(shutdown_manager: &ShutdownManager, app: F, drain_timeout: Duration)
where
    F: Future<Output = ()>,
{
    tokio::pin!(app);

    tokio::select! {
        biased;
        _ = &mut app => {
            tracing::info!("Application finished normally");
            return;
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received, waiting for application to wind down");
        }
    }

    if tokio::time::timeout(drain_timeout, &mut app).await.is_err() {
        tracing::warn!(
            "Application did not finish within {}s after shutdown",
            drain_timeout.as_secs()
        );
    }
}
