//! Autopilot 演示入口
//!
//! 用进程内 Mock 守护进程与回放帧跑一次完整会话：
//! 守护进程冷启动 → 热路径命中（动作触发崩溃并恢复）→ 连续未命中回退 AI → AI 结束任务。
//! 用法：`autopilot [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use autopilot::config::{load_config, AppConfig};
use autopilot::core::{
    run_with_graceful_shutdown, AutomationBuilder, DaemonStopCleanup, ShutdownCoordinator,
    ShutdownManager,
};
use autopilot::daemon::MockDaemon;
use autopilot::decider::{AiDecision, MockDecider};
use autopilot::hotpath::{Action, ElementHasher, InMemoryRuleRegistry, UiHasher};
use autopilot::observability;
use autopilot::perception::{Bounds, DetectedElement, Frame, ReplayFrameSource};

const SCREEN_WIDTH: u32 = 1080;
const SCREEN_HEIGHT: u32 = 2400;

fn screen(labels: &[(&str, &str, i32)]) -> Frame {
    Frame {
        elements: labels
            .iter()
            .map(|(kind, label, y)| DetectedElement::new(*kind, *label, Bounds::new(80, *y, 400, 120)))
            .collect(),
        image_width: SCREEN_WIDTH,
        image_height: SCREEN_HEIGHT,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }
    };

    let home = screen(&[("icon", "Settings", 300), ("icon", "Camera", 600)]);
    let settings = screen(&[("text", "Wi-Fi", 400), ("text", "Bluetooth", 700)]);
    let wifi = screen(&[("text", "Wi-Fi", 200), ("switch", "On", 200)]);

    // 主屏 → 点击设置 的规则已学会
    let registry = Arc::new(InMemoryRuleRegistry::new());
    let home_hash = ElementHasher::new().compute_hash(&home.snapshot());
    registry.learn(home_hash, Action::Tap { x: 280, y: 360 }, 0.95);

    let frames = Arc::new(ReplayFrameSource::new(vec![
        home.clone(),
        home,
        settings.clone(),
        settings.clone(),
        settings,
        wifi,
    ]));

    let decider = Arc::new(MockDecider::new(vec![
        Ok(AiDecision::Act {
            action: Action::Tap { x: 280, y: 460 },
            reasoning: "open Wi-Fi settings".into(),
        }),
        Ok(AiDecision::Finish {
            summary: "Wi-Fi settings opened".into(),
        }),
    ]));

    let daemon = Arc::new(MockDaemon::new());
    daemon.set_injector_available(true);
    daemon.set_crash_on_action(true);

    let shutdown = Arc::new(ShutdownManager::new());
    let runner = AutomationBuilder::new(config)
        .with_registry(registry)
        .with_parent_token(shutdown.token())
        .build(daemon.clone(), decider, frames);

    let mut cleanup = ShutdownCoordinator::new();
    cleanup.register(DaemonStopCleanup::new(runner.coordinator().clone()));

    let runner = Arc::new(runner);
    let app_runner = runner.clone();
    run_with_graceful_shutdown(
        shutdown.clone(),
        async move {
            let result = app_runner.run("Open Wi-Fi settings").await;
            tracing::info!(
                success = result.is_success(),
                steps = result.steps(),
                "Session finished"
            );
        },
        || async { cleanup.run_cleanup().await },
    )
    .await;

    if shutdown.is_shutdown() {
        tracing::info!(session = %runner.session_id(), "Session interrupted by shutdown");
    }

    let snapshot = serde_json::to_string_pretty(&runner.state().snapshot())
        .context("Failed to serialize final snapshot")?;
    println!("{snapshot}");

    Ok(())
}
