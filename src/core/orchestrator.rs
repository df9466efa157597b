//! 自动化主循环
//!
//! 每个任务：确保守护进程就绪 → 下发热路径规则 → 逐步（最多 max_steps）执行：
//! 截帧 → 热路径尝试 → 连续未命中达到阈值时回退 AI → 执行 AI 动作并学习为规则。
//! 动作失败且守护进程已不可用时走崩溃恢复；恢复耗尽则以失败结束会话，不会无限重试。
//! 所有进度与健康事实写入 AutomationStateManager。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AutomationSection, HotPathSection};
use crate::core::{
    ActionLogEntry, ActionSource, AiDecisionMode, AutomationError, AutomationMode,
    AutomationResult, AutomationStateManager, RunningState, SessionSupervisor, StepPhase,
};
use crate::daemon::{DaemonCoordinationResult, DaemonCoordinator};
use crate::decider::{AiDecider, AiDecision};
use crate::hotpath::{Action, HotPathExecutor, HotPathResult, RuleRegistry};
use crate::perception::{Frame, FrameSource};

/// 主循环所需组件（由 AutomationBuilder 组装）
pub struct RunnerParts {
    pub coordinator: Arc<DaemonCoordinator>,
    pub hot_path: Arc<HotPathExecutor>,
    pub registry: Arc<dyn RuleRegistry>,
    pub state: Arc<AutomationStateManager>,
    pub decider: Arc<dyn AiDecider>,
    pub frames: Arc<dyn FrameSource>,
}

/// 单步结果
enum StepOutcome {
    Continue,
    Finished(String),
}

pub struct AutomationRunner {
    parts: RunnerParts,
    max_steps: usize,
    frame_interval: Duration,
    learned_confidence: f32,
    supervisor: SessionSupervisor,
    session_id: String,
}

impl AutomationRunner {
    pub fn new(
        parts: RunnerParts,
        automation: &AutomationSection,
        hot_path: &HotPathSection,
        supervisor: SessionSupervisor,
    ) -> Self {
        parts.state.set_mode(automation.mode);
        Self {
            parts,
            max_steps: automation.max_steps,
            frame_interval: Duration::from_millis(automation.frame_interval_ms),
            learned_confidence: hot_path.learned_confidence,
            supervisor,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn state(&self) -> &Arc<AutomationStateManager> {
        &self.parts.state
    }

    pub fn coordinator(&self) -> &Arc<DaemonCoordinator> {
        &self.parts.coordinator
    }

    pub fn hot_path(&self) -> &Arc<HotPathExecutor> {
        &self.parts.hot_path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 取消当前会话（包括进行中的退避等待）
    pub fn cancel(&self) {
        self.supervisor.cancel();
    }

    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    /// 运行一个任务直到完成 / 失败 / 取消；结果同时写入状态管理器
    pub async fn run(&self, task: &str) -> AutomationResult {
        tracing::info!(session = %self.session_id, task, "Automation session started");
        self.parts.coordinator.reset();
        self.parts.hot_path.reset();

        let mut running = RunningState::new(task, self.max_steps);
        self.parts.state.update_running(running.clone());

        match self.parts.coordinator.ensure_ready().await {
            DaemonCoordinationResult::Ready => {}
            DaemonCoordinationResult::NotAvailable
            | DaemonCoordinationResult::RecoveryFailed { .. } => {
                return self.finish_with_error(AutomationError::DaemonUnavailable, 0);
            }
        }
        self.parts.coordinator.configure_hot_path().await;

        for step in 1..=self.max_steps {
            if self.supervisor.is_cancelled() {
                return self.finish_with_error(AutomationError::Cancelled, step - 1);
            }

            let now = chrono::Utc::now().timestamp_millis();
            running.current_step = step;
            running.step_start_time_ms = now;
            running.phase = StepPhase::Perceiving;
            running.current_reasoning = None;
            self.parts.state.update_running(running.clone());

            match self.step(&mut running).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Finished(summary)) => {
                    return self.finish(AutomationResult::Success {
                        summary,
                        steps: step,
                    });
                }
                Err(e) => return self.finish_with_error(e, step),
            }

            if !self.frame_interval.is_zero() {
                let cancel = self.supervisor.cancel_token();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return self.finish_with_error(AutomationError::Cancelled, step);
                    }
                    _ = tokio::time::sleep(self.frame_interval) => {}
                }
            }
        }

        self.finish_with_error(AutomationError::MaxStepsReached, self.max_steps)
    }

    fn finish(&self, result: AutomationResult) -> AutomationResult {
        self.parts.state.complete(result.clone());
        result
    }

    fn finish_with_error(&self, err: AutomationError, steps: usize) -> AutomationResult {
        let result = match err {
            AutomationError::Cancelled => AutomationResult::Cancelled { steps },
            other => {
                tracing::warn!(session = %self.session_id, "Automation failed: {}", other);
                AutomationResult::Failure {
                    reason: other.to_string(),
                    steps,
                }
            }
        };
        self.finish(result)
    }

    async fn step(&self, running: &mut RunningState) -> Result<StepOutcome, AutomationError> {
        let frame = self
            .parts
            .frames
            .next_frame()
            .await
            .map_err(AutomationError::Perception)?;

        let mode = self.parts.state.automation_mode();
        if mode != AutomationMode::AiOnly {
            running.phase = StepPhase::HotPath;
            self.parts.state.update_running(running.clone());

            match self
                .parts
                .hot_path
                .try_execute(&frame.elements, frame.image_width, frame.image_height)
                .await
            {
                HotPathResult::Hit {
                    action, ui_hash, ..
                } => {
                    self.parts.state.record_hot_path_hit();
                    self.parts.hot_path.record_success(&ui_hash, &action);
                    self.log_action(running, action, ActionSource::HotPath, true);
                    return Ok(StepOutcome::Continue);
                }
                HotPathResult::Miss => {
                    self.parts.state.record_hot_path_miss();
                }
                HotPathResult::ExecutionFailed { action, reason } => {
                    self.parts.hot_path.record_failure(&action);
                    self.log_action(running, action, ActionSource::HotPath, false);
                    self.recover_if_crashed(running, &reason).await?;
                    return Ok(StepOutcome::Continue);
                }
            }

            if mode == AutomationMode::HotPathOnly || !self.parts.hot_path.should_trigger_ai_fallback() {
                return Ok(StepOutcome::Continue);
            }
            tracing::info!(
                misses = self.parts.hot_path.consecutive_no_match_frames(),
                "Hot path fallback triggered, asking AI"
            );
        }

        self.ai_step(running, &frame).await
    }

    async fn ai_step(
        &self,
        running: &mut RunningState,
        frame: &Frame,
    ) -> Result<StepOutcome, AutomationError> {
        running.phase = StepPhase::Reasoning;
        self.parts.state.update_running(running.clone());
        self.parts.state.set_ai_decision_mode(AiDecisionMode::Analyzing);

        let snapshot = frame.snapshot();
        let decision = self
            .parts
            .decider
            .decide(&running.task_description, &snapshot, &running.action_history)
            .await;

        let decision = match decision {
            Ok(decision) => {
                self.parts.state.record_ai_call(true);
                decision
            }
            Err(e) => {
                // 下一步重试，受 max_steps 约束
                tracing::warn!("AI decision failed: {}", e);
                self.parts.state.record_ai_call(false);
                self.parts.state.set_ai_decision_mode(AiDecisionMode::Idle);
                running.retry_attempt = running.retry_attempt.saturating_add(1);
                running.retry_reason = Some(e);
                self.parts.state.update_running(running.clone());
                return Ok(StepOutcome::Continue);
            }
        };

        let (action, reasoning) = match decision {
            AiDecision::Finish { summary } => return Ok(StepOutcome::Finished(summary)),
            AiDecision::Fail { reason } => return Err(AutomationError::Decision(reason)),
            AiDecision::Act { action, reasoning } => (action, reasoning),
        };

        running.phase = StepPhase::Executing;
        running.current_reasoning = Some(reasoning);
        self.parts.state.update_running(running.clone());
        self.parts.state.set_ai_decision_mode(AiDecisionMode::Acting);

        let outcome = self.parts.hot_path.dispatch_action(&action).await;
        // AI 动作之后重新给热路径机会
        self.parts.hot_path.reset();
        self.parts.state.set_ai_decision_mode(AiDecisionMode::Idle);

        match outcome {
            Ok(()) => {
                running.retry_attempt = 0;
                running.retry_reason = None;
                if !frame.elements.is_empty() {
                    let ui_hash = self.parts.hot_path.compute_hash(&snapshot);
                    self.learn(&ui_hash, &action);
                }
                self.log_action(running, action, ActionSource::Ai, true);
                Ok(StepOutcome::Continue)
            }
            Err(reason) => {
                self.log_action(running, action, ActionSource::Ai, false);
                self.recover_if_crashed(running, &reason).await?;
                Ok(StepOutcome::Continue)
            }
        }
    }

    /// 同一画面再次由 AI 选出同一动作时只加成功计数，否则学习为新规则
    fn learn(&self, ui_hash: &str, action: &Action) {
        match self.parts.registry.lookup_by_hash(ui_hash) {
            Some(cached) if cached.action == *action => {
                self.parts.registry.increment_success_count(&action.to_string());
            }
            _ => {
                self.parts
                    .registry
                    .learn_rule(ui_hash, action, self.learned_confidence);
            }
        }
    }

    fn log_action(&self, running: &mut RunningState, action: Action, source: ActionSource, success: bool) {
        running
            .action_history
            .push(ActionLogEntry::new(running.current_step, action.clone(), source, success));
        running.last_action = Some(action);
        self.parts.state.update_running(running.clone());
    }

    /// 动作失败后若守护进程已不可用，执行崩溃恢复
    async fn recover_if_crashed(
        &self,
        running: &mut RunningState,
        reason: &str,
    ) -> Result<(), AutomationError> {
        if self.parts.coordinator.is_daemon_available() {
            return Ok(());
        }

        self.parts.state.record_crash(reason);
        running.phase = StepPhase::Recovering;
        running.retry_attempt = self.parts.coordinator.restart_attempts().saturating_add(1);
        running.retry_reason = Some(reason.to_string());
        self.parts.state.update_running(running.clone());

        let outcome = self.parts.coordinator.handle_crash_with_reason().await;
        if outcome.recovered {
            self.parts.state.record_restart();
            self.parts.state.record_recovery();
            return Ok(());
        }
        if self.supervisor.is_cancelled() {
            return Err(AutomationError::Cancelled);
        }
        Err(AutomationError::RecoveryFailed(
            outcome.reason.unwrap_or_else(|| reason.to_string()),
        ))
    }
}
