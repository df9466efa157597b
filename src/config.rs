//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AUTOPILOT__*` 覆盖（双下划线表示嵌套，如 `AUTOPILOT__DAEMON__MAX_RESTART_ATTEMPTS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AutomationMode;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub hot_path: HotPathSection,
    #[serde(default)]
    pub automation: AutomationSection,
    #[serde(default)]
    pub health: HealthSection,
}

/// [daemon] 段：重启预算与退避
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSection {
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            max_restart_attempts: default_max_restart_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_restart_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// [hot_path] 段：AI 回退阈值、成功轨迹文件
#[derive(Debug, Clone, Deserialize)]
pub struct HotPathSection {
    /// 连续未命中多少帧后回退 AI
    #[serde(default = "default_ai_fallback_threshold")]
    pub ai_fallback_threshold: u32,
    /// 未设置时不写轨迹
    pub trace_log_path: Option<PathBuf>,
    /// AI 成功动作学习为规则时的初始置信度（低于高置信阈值，需重复成功才会被热路径回放）
    #[serde(default = "default_learned_confidence")]
    pub learned_confidence: f32,
}

impl Default for HotPathSection {
    fn default() -> Self {
        Self {
            ai_fallback_threshold: default_ai_fallback_threshold(),
            trace_log_path: None,
            learned_confidence: default_learned_confidence(),
        }
    }
}

fn default_ai_fallback_threshold() -> u32 {
    crate::hotpath::DEFAULT_AI_FALLBACK_THRESHOLD
}

fn default_learned_confidence() -> f32 {
    0.7
}

/// [automation] 段：步数上限、模式、帧间隔
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub mode: AutomationMode,
    /// 两帧之间的等待（毫秒），0 表示不等待
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            mode: AutomationMode::default(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

fn default_max_steps() -> usize {
    50
}

fn default_frame_interval_ms() -> u64 {
    500
}

/// [health] 段：恢复时是否同时清空历史计数（默认保留，恢复只改变状态）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthSection {
    #[serde(default)]
    pub clear_history_on_recovery: bool,
}

/// 从 config 目录加载配置，环境变量 AUTOPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AUTOPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AUTOPILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
