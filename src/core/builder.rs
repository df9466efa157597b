//! 自动化构建器：统一的组件装配
//!
//! 按配置组装规则库、UI 哈希、轨迹日志、热路径执行器、守护进程协调器、状态管理器与会话监管，
//! 演示程序与集成测试共用同一套装配逻辑。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AutomationRunner, AutomationStateManager, RunnerParts, SessionSupervisor};
use crate::daemon::{ActionDispatch, DaemonCoordinator, DaemonLifecycle, DaemonSession};
use crate::decider::AiDecider;
use crate::hotpath::{
    ElementHasher, HotPathExecutor, InMemoryRuleRegistry, JsonlTraceLog, NoopTraceLog,
    RuleRegistry, TraceLog, UiHasher,
};
use crate::perception::FrameSource;

pub struct AutomationBuilder {
    config: AppConfig,
    registry: Option<Arc<dyn RuleRegistry>>,
    hasher: Option<Arc<dyn UiHasher>>,
    trace: Option<Arc<dyn TraceLog>>,
    state: Option<Arc<AutomationStateManager>>,
    parent_token: Option<CancellationToken>,
}

impl AutomationBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            hasher: None,
            trace: None,
            state: None,
            parent_token: None,
        }
    }

    /// 默认为空的 InMemoryRuleRegistry
    pub fn with_registry(mut self, registry: Arc<dyn RuleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 默认 ElementHasher
    pub fn with_hasher(mut self, hasher: Arc<dyn UiHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// 默认按 [hot_path] trace_log_path 决定 JSONL 或不记录
    pub fn with_trace_log(mut self, trace: Arc<dyn TraceLog>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// 共享一个已有的状态管理器（例如 UI 已订阅）
    pub fn with_state(mut self, state: Arc<AutomationStateManager>) -> Self {
        self.state = Some(state);
        self
    }

    /// 会话 token 作为该 token 的子 token（进程关闭时会话一并取消）
    pub fn with_parent_token(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }

    fn build_trace_log(&self) -> Arc<dyn TraceLog> {
        match &self.config.hot_path.trace_log_path {
            Some(path) => Arc::new(JsonlTraceLog::new(path.clone())),
            None => Arc::new(NoopTraceLog),
        }
    }

    /// 同一个对象同时实现生命周期、会话与动作分发时的便捷入口
    pub fn build<D>(
        self,
        daemon: Arc<D>,
        decider: Arc<dyn AiDecider>,
        frames: Arc<dyn FrameSource>,
    ) -> AutomationRunner
    where
        D: DaemonLifecycle + DaemonSession + ActionDispatch + 'static,
    {
        self.build_with(daemon.clone(), daemon.clone(), daemon, decider, frames)
    }

    pub fn build_with(
        self,
        lifecycle: Arc<dyn DaemonLifecycle>,
        session: Arc<dyn DaemonSession>,
        dispatch: Arc<dyn ActionDispatch>,
        decider: Arc<dyn AiDecider>,
        frames: Arc<dyn FrameSource>,
    ) -> AutomationRunner {
        let trace = self.trace.clone().unwrap_or_else(|| self.build_trace_log());
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(InMemoryRuleRegistry::new()));
        let hasher = self.hasher.unwrap_or_else(|| Arc::new(ElementHasher::new()));

        let hot_path = Arc::new(
            HotPathExecutor::new(registry.clone(), hasher, trace, dispatch, session.clone())
                .with_ai_fallback_threshold(self.config.hot_path.ai_fallback_threshold),
        );

        let supervisor = match &self.parent_token {
            Some(parent) => SessionSupervisor::with_parent(parent),
            None => SessionSupervisor::new(),
        };

        let coordinator = Arc::new(
            DaemonCoordinator::new(lifecycle, session, hot_path.clone(), &self.config.daemon)
                .with_cancel_token(supervisor.child_token()),
        );

        let state = self
            .state
            .unwrap_or_else(|| Arc::new(AutomationStateManager::from_config(&self.config.health)));

        tracing::debug!(
            max_restart_attempts = self.config.daemon.max_restart_attempts,
            ai_fallback_threshold = self.config.hot_path.ai_fallback_threshold,
            mode = ?self.config.automation.mode,
            "Automation components assembled"
        );

        AutomationRunner::new(
            RunnerParts {
                coordinator,
                hot_path,
                registry,
                state,
                decider,
                frames,
            },
            &self.config.automation,
            &self.config.hot_path,
            supervisor,
        )
    }
}
